//! Probe executor and status resolver for the vendor status form.
//!
//! Each probe launches its own headless Chrome over CDP, fills in the
//! beneficiary id, triggers the vendor search and watches two evidence
//! channels: JavaScript dialogs and the on-page status/vendor elements.
//!
//! ```ignore
//! use vendorwatch_browser::{FormProber, ProbeSettings};
//!
//! let prober = FormProber::new(ProbeSettings::from_config(&config, artifacts_dir));
//! let report = prober.probe(&id).await;
//! println!("{}", report.status);
//! ```

pub mod artifact;
pub mod detect;
pub mod dialog;
pub mod error;
pub mod observe;
pub mod prober;
pub mod resolve;
pub mod script;
pub mod session;
pub mod types;

pub use {
    artifact::{Artifact, ArtifactKind},
    dialog::QuotaSignal,
    error::BrowserError,
    observe::Observation,
    prober::{FormProber, ProbeReport},
    resolve::{Capture, Resolution, resolve},
    types::{BrowserConfig, ProbeSettings, ProbeTimings, Selectors},
};
