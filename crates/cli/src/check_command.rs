use std::path::Path;

use {
    anyhow::Context,
    vendorwatch_browser::{FormProber, ProbeReport, ProbeSettings},
    vendorwatch_common::BeneficiaryId,
    vendorwatch_config::VendorwatchConfig,
};

/// Probe `raw_id` once and print the resolved status.
pub async fn check(
    config: &VendorwatchConfig,
    data_dir: &Path,
    raw_id: &str,
    keep_artifact: bool,
) -> anyhow::Result<()> {
    let id = BeneficiaryId::parse(raw_id)
        .with_context(|| format!("invalid beneficiary id {raw_id:?}"))?;

    let artifacts_dir = config.artifacts.dir_in(data_dir);
    tokio::fs::create_dir_all(&artifacts_dir)
        .await
        .with_context(|| format!("creating {}", artifacts_dir.display()))?;

    let prober = FormProber::new(ProbeSettings::from_config(config, artifacts_dir));
    let report = prober.probe(&id).await;
    println!("{}", summary_line(&id, &report));

    if let Some(artifact) = report.artifact {
        if keep_artifact {
            println!("screenshot: {}", artifact.keep().display());
        } else {
            artifact.discard().await;
        }
    }
    Ok(())
}

fn summary_line(id: &BeneficiaryId, report: &ProbeReport) -> String {
    format!(
        "{id}: {} ({:.1}s)",
        report.status,
        report.elapsed.as_secs_f64()
    )
}
