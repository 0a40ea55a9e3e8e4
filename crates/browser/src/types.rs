//! Probe settings, decoupled from the on-disk config schema.

use std::{path::PathBuf, time::Duration};

use vendorwatch_config::VendorwatchConfig;

/// How Chrome is launched for a probe.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: Option<String>,
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        (&vendorwatch_config::BrowserConfig::default()).into()
    }
}

impl From<&vendorwatch_config::BrowserConfig> for BrowserConfig {
    fn from(cfg: &vendorwatch_config::BrowserConfig) -> Self {
        Self {
            chrome_path: cfg.chrome_path.clone(),
            headless: cfg.headless,
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
            user_agent: cfg.user_agent.clone(),
            chrome_args: cfg.chrome_args.clone(),
        }
    }
}

/// Elements of the status form.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub beneficiary_input: String,
    pub search_button_text: String,
    pub search_vendor_button: String,
    pub quota_message: String,
    pub vendor_select: String,
}

impl From<&vendorwatch_config::SelectorsConfig> for Selectors {
    fn from(cfg: &vendorwatch_config::SelectorsConfig) -> Self {
        Self {
            beneficiary_input: cfg.beneficiary_input.clone(),
            search_button_text: cfg.search_button_text.clone(),
            search_vendor_button: cfg.search_vendor_button.clone(),
            quota_message: cfg.quota_message.clone(),
            vendor_select: cfg.vendor_select.clone(),
        }
    }
}

/// Time budget of a single probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTimings {
    pub page_load: Duration,
    pub ready: Duration,
    pub settle: Duration,
    pub evidence: Duration,
    pub redraw: Duration,
    /// Interval between evidence/readiness checks.
    pub poll_interval: Duration,
}

impl From<&vendorwatch_config::ProbeConfig> for ProbeTimings {
    fn from(cfg: &vendorwatch_config::ProbeConfig) -> Self {
        Self {
            page_load: Duration::from_secs(cfg.page_load_timeout_secs),
            ready: Duration::from_secs(cfg.ready_timeout_secs),
            settle: Duration::from_millis(cfg.settle_delay_ms),
            evidence: Duration::from_secs(cfg.evidence_timeout_secs),
            redraw: Duration::from_millis(cfg.redraw_delay_ms),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Everything [`crate::FormProber`] needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub url: String,
    pub quota_phrase: String,
    pub selectors: Selectors,
    pub timings: ProbeTimings,
    pub browser: BrowserConfig,
    /// Directory receiving screenshots until they are sent and discarded.
    pub artifacts_dir: PathBuf,
}

impl ProbeSettings {
    pub fn from_config(cfg: &VendorwatchConfig, artifacts_dir: PathBuf) -> Self {
        Self {
            url: cfg.target.url.clone(),
            quota_phrase: cfg.target.quota_phrase.clone(),
            selectors: (&cfg.target.selectors).into(),
            timings: (&cfg.probe).into(),
            browser: (&cfg.browser).into(),
            artifacts_dir,
        }
    }
}
