//! Probe seam, so the pipeline can run without Chrome.

use {
    async_trait::async_trait,
    vendorwatch_browser::{FormProber, ProbeReport},
    vendorwatch_common::BeneficiaryId,
};

/// Produces a resolved status (and optional artifact) for one beneficiary.
/// Must not fail: problems are reported as `ResolvedStatus::Error`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, id: &BeneficiaryId) -> ProbeReport;
}

#[async_trait]
impl Prober for FormProber {
    async fn probe(&self, id: &BeneficiaryId) -> ProbeReport {
        FormProber::probe(self, id).await
    }
}
