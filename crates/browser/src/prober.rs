//! Probe executor: one full round-trip against the status form.

use std::time::{Duration, Instant};

use {
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
    vendorwatch_common::{BeneficiaryId, ResolvedStatus},
};

use crate::{
    artifact::{Artifact, ArtifactKind},
    dialog::{self, QuotaSignal},
    error::BrowserError,
    observe::{DomEvidence, Observation},
    resolve::{Capture, Resolution, resolve},
    script,
    session::{self, ProbePage, ProbeSession},
    types::ProbeSettings,
};

/// Resolved outcome of a probe plus any evidence captured for it.
#[derive(Debug)]
pub struct ProbeReport {
    pub status: ResolvedStatus,
    pub artifact: Option<Artifact>,
    pub elapsed: Duration,
}

/// What one run against a page produced.
struct ProbeRun {
    resolution: Resolution,
    artifact: Option<Artifact>,
    observation: Observation,
}

/// Drives the status form with a fresh Chrome per probe.
#[derive(Debug, Clone)]
pub struct FormProber {
    settings: ProbeSettings,
}

impl FormProber {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    /// Probe `id` and resolve the result. Never fails: problems become
    /// `ResolvedStatus::Error` with a diagnostic screenshot when one can be taken.
    pub async fn probe(&self, id: &BeneficiaryId) -> ProbeReport {
        let started = Instant::now();

        let session =
            match ProbeSession::launch(&self.settings.browser, self.settings.timings.page_load).await {
                Ok(session) => session,
                Err(e) => {
                    warn!(beneficiary_id = %id, error = %e, "could not start probe session");
                    return ProbeReport {
                        status: ResolvedStatus::error(e.to_string()),
                        artifact: None,
                        elapsed: started.elapsed(),
                    };
                },
            };

        let signal = QuotaSignal::new();
        let listener =
            dialog::spawn_listener(session.page(), self.settings.quota_phrase.clone(), signal.clone())
                .await;
        let run = self.run(session, id, &signal, listener).await;

        let elapsed = started.elapsed();
        info!(
            beneficiary_id = %id,
            status = run.resolution.status.label(),
            dialog_quota = run.observation.dialog_quota,
            dom_quota = run.observation.dom_quota,
            vendor_options = ?run.observation.vendor_options,
            elapsed_ms = elapsed.as_millis() as u64,
            "probe finished"
        );

        ProbeReport {
            status: run.resolution.status,
            artifact: run.artifact,
            elapsed,
        }
    }

    /// Drive the form on `page`, resolve and capture, then stop the dialog
    /// `listener` and close `page` whatever happened.
    async fn run<P: ProbePage>(
        &self,
        page: P,
        id: &BeneficiaryId,
        signal: &QuotaSignal,
        listener: Result<JoinHandle<()>, BrowserError>,
    ) -> ProbeRun {
        let mut observation = Observation::default();
        let listener = match listener {
            Ok(handle) => Some(handle),
            Err(e) => {
                observation.failure = Some(format!("dialog listener: {e}"));
                None
            },
        };

        if observation.failure.is_none()
            && let Err(e) = self.interact(&page, id, signal, &mut observation).await
        {
            debug!(beneficiary_id = %id, error = %e, "probe interaction failed");
            observation.failure = Some(e.to_string());
        }
        observation.dialog_quota = signal.is_set();

        let resolution = resolve(&observation);
        let artifact = self.capture(&page, id, resolution.capture).await;

        if let Some(listener) = listener {
            listener.abort();
        }
        page.close().await;

        ProbeRun {
            resolution,
            artifact,
            observation,
        }
    }

    async fn interact(
        &self,
        page: &impl ProbePage,
        id: &BeneficiaryId,
        signal: &QuotaSignal,
        observation: &mut Observation,
    ) -> Result<(), BrowserError> {
        let sel = &self.settings.selectors;
        let timings = &self.settings.timings;

        page.goto(&self.settings.url, timings.page_load).await?;
        debug!(beneficiary_id = %id, "form loaded");

        if !session::eval::<bool>(
            page,
            &script::fill(&sel.beneficiary_input, id.as_str()),
            timings.ready,
        )
        .await?
        {
            return Err(BrowserError::ElementNotFound(sel.beneficiary_input.clone()));
        }

        if !session::eval::<bool>(
            page,
            &script::click_button_with_text(&sel.search_button_text),
            timings.ready,
        )
        .await?
        {
            return Err(BrowserError::ElementNotFound(format!(
                "button containing \"{}\"",
                sel.search_button_text
            )));
        }

        let ready = session::wait_until(
            page,
            &script::is_visible(&sel.search_vendor_button),
            timings.ready,
            timings.poll_interval,
        )
        .await?;
        if !ready {
            // The first search may already have raised the quota dialog.
            if signal.is_set() {
                debug!(beneficiary_id = %id, "quota dialog before vendor search");
                return Ok(());
            }
            return Err(BrowserError::Timeout(format!(
                "{} not visible after {}s",
                sel.search_vendor_button,
                timings.ready.as_secs()
            )));
        }

        if !session::eval::<bool>(page, &script::click(&sel.search_vendor_button), timings.ready)
            .await?
        {
            return Err(BrowserError::ElementNotFound(sel.search_vendor_button.clone()));
        }

        tokio::time::sleep(timings.settle).await;
        self.gather_evidence(page, signal, observation).await;
        Ok(())
    }

    /// Poll both channels until one is conclusive or the window closes.
    /// Running out of time is the normal "no evidence" outcome.
    async fn gather_evidence(
        &self,
        page: &impl ProbePage,
        signal: &QuotaSignal,
        observation: &mut Observation,
    ) {
        let sel = &self.settings.selectors;
        let timings = &self.settings.timings;
        let js = script::dom_evidence(&sel.quota_message, &self.settings.quota_phrase, &sel.vendor_select);
        let deadline = tokio::time::Instant::now() + timings.evidence;

        loop {
            if signal.is_set() {
                return;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                debug!("evidence window closed without a signal");
                return;
            }
            match session::eval::<DomEvidence>(page, &js, remaining).await {
                Ok(evidence) => {
                    observation.record_dom(&evidence);
                    if evidence.is_conclusive() {
                        return;
                    }
                },
                Err(e) => debug!(error = %e, "evidence poll failed"),
            }
            tokio::time::sleep(timings.poll_interval.min(remaining)).await;
        }
    }

    /// Execute the resolver's capture decision. Failures are logged and yield `None`.
    async fn capture(
        &self,
        page: &impl ProbePage,
        id: &BeneficiaryId,
        capture: Capture,
    ) -> Option<Artifact> {
        let kind = match capture {
            Capture::None => return None,
            Capture::ExpandedSelection { option_count } => {
                let js = script::expand_select(&self.settings.selectors.vendor_select);
                match session::eval::<bool>(page, &js, self.settings.timings.ready).await {
                    Ok(_) => debug!(option_count, "vendor list expanded"),
                    Err(e) => warn!(error = %e, "failed to expand vendor list"),
                }
                tokio::time::sleep(self.settings.timings.redraw).await;
                ArtifactKind::Availability
            },
            Capture::Diagnostic => ArtifactKind::Diagnostic,
        };

        let path = self.settings.artifacts_dir.join(kind.file_name(id));
        match page.screenshot_to(&path).await {
            Ok(()) => Some(Artifact::new(path, kind)),
            Err(e) => {
                warn!(beneficiary_id = %id, ?kind, error = %e, "screenshot capture failed");
                None
            },
        }
    }
}
