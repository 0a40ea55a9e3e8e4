//! Raw evidence gathered during one probe.

use serde::Deserialize;

/// What one probe saw, before resolution. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Quota phrase seen in a transient dialog.
    pub dialog_quota: bool,
    /// Quota phrase seen in the on-page status element.
    pub dom_quota: bool,
    /// Option count of the vendor control, present only once it became visible.
    pub vendor_options: Option<usize>,
    /// Unexpected navigation/interaction failure.
    pub failure: Option<String>,
}

impl Observation {
    pub fn quota_exceeded(&self) -> bool {
        self.dialog_quota || self.dom_quota
    }

    /// Fold one DOM poll into the observation.
    pub fn record_dom(&mut self, evidence: &DomEvidence) {
        self.dom_quota |= evidence.quota_text;
        if evidence.vendor_select_visible {
            self.vendor_options = Some(evidence.option_count);
        }
    }
}

/// Result of one evaluation of [`crate::script::dom_evidence`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DomEvidence {
    #[serde(default)]
    pub quota_text: bool,
    #[serde(default)]
    pub vendor_select_visible: bool,
    #[serde(default)]
    pub option_count: usize,
}

impl DomEvidence {
    /// Whether this poll ends the evidence window.
    pub fn is_conclusive(&self) -> bool {
        self.quota_text || self.vendor_select_visible
    }
}
