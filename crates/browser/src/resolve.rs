//! Reduce an [`Observation`] to one canonical status plus a capture decision.

use vendorwatch_common::ResolvedStatus;

use crate::observe::Observation;

/// Visual evidence to take from the live page before the session closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    None,
    /// Expand the vendor control to `option_count` rows, then screenshot it.
    ExpandedSelection { option_count: usize },
    /// Best-effort screenshot of whatever the page shows after a failure.
    Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: ResolvedStatus,
    pub capture: Capture,
}

/// Pure status resolution.
///
/// Quota evidence from either channel wins over everything, including a
/// populated vendor control and a later interaction failure. Availability
/// needs more than one option (the first is the placeholder).
pub fn resolve(observation: &Observation) -> Resolution {
    if observation.quota_exceeded() {
        return Resolution {
            status: ResolvedStatus::NotAvailable,
            capture: Capture::None,
        };
    }

    if let Some(detail) = &observation.failure {
        return Resolution {
            status: ResolvedStatus::error(detail.clone()),
            capture: Capture::Diagnostic,
        };
    }

    match observation.vendor_options {
        Some(option_count) if option_count > 1 => Resolution {
            status: ResolvedStatus::Available,
            capture: Capture::ExpandedSelection { option_count },
        },
        _ => Resolution {
            status: ResolvedStatus::NotAvailable,
            capture: Capture::None,
        },
    }
}
