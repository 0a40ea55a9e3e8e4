/// Config schema types (target form, probe timings, browser, monitor, telegram, storage).
use std::path::{Path, PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Public status page of the PM-KUSUM "track A1 form" flow.
pub const DEFAULT_TARGET_URL: &str = "https://offgridmtsup.mahadiscom.in/AGSolarPumpMTS/PMKusumCons?uiActionName=trackA1FormStatus";

/// Text shown (as a pop-up or inline) when no vendor slot is left.
pub const DEFAULT_QUOTA_PHRASE: &str = "All Empanelled Vendors Quota Exceeded";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorwatchConfig {
    pub target: TargetConfig,
    pub probe: ProbeConfig,
    pub browser: BrowserConfig,
    pub monitor: MonitorConfig,
    pub telegram: TelegramConfig,
    pub storage: StorageConfig,
    pub artifacts: ArtifactsConfig,
}

/// The external form being probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub url: String,
    /// Substring that marks quota-exceeded evidence in a dialog or on the page.
    pub quota_phrase: String,
    pub selectors: SelectorsConfig,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TARGET_URL.into(),
            quota_phrase: DEFAULT_QUOTA_PHRASE.into(),
            selectors: SelectorsConfig::default(),
        }
    }
}

/// CSS selectors (and one button label) used to drive the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorsConfig {
    pub beneficiary_input: String,
    /// Visible text of the first search button; matched as a substring.
    pub search_button_text: String,
    pub search_vendor_button: String,
    pub quota_message: String,
    pub vendor_select: String,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            beneficiary_input: "#beneficiaryId".into(),
            search_button_text: "Search".into(),
            search_vendor_button: "#searchVendorBtn".into(),
            quota_message: "#quotaMsg".into(),
            vendor_select: "#VendorCode".into(),
        }
    }
}

/// Time budget of one probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub page_load_timeout_secs: u64,
    /// How long the vendor search button may take to become visible.
    pub ready_timeout_secs: u64,
    pub settle_delay_ms: u64,
    /// Window in which quota or vendor evidence is expected after the search.
    pub evidence_timeout_secs: u64,
    /// Pause after expanding the vendor list, before the screenshot.
    pub redraw_delay_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            page_load_timeout_secs: 60,
            ready_timeout_secs: 30,
            settle_delay_ms: 2_000,
            evidence_timeout_secs: 5,
            redraw_delay_ms: 500,
        }
    }
}

/// Chrome launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary. Auto-detected when unset.
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Extra command-line flags passed to Chrome.
    pub chrome_args: Vec<String>,
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            viewport_width: 1366,
            viewport_height: 900,
            chrome_args: Vec::new(),
            user_agent: None,
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    /// Delay before the one-shot check that follows a registration.
    pub registration_check_delay_secs: u64,
    /// IANA zone used to render probe times in notifications.
    pub timezone: String,
    /// Probes allowed in flight at once; 1 means strictly sequential.
    pub max_concurrent_probes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 180,
            initial_delay_secs: 10,
            registration_check_delay_secs: 1,
            timezone: "Asia/Kolkata".into(),
            max_concurrent_probes: 1,
        }
    }
}

/// Telegram bot account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    #[serde(serialize_with = "serialize_option_secret", skip_serializing_if = "Option::is_none")]
    pub token: Option<Secret<String>>,
    /// Long-poll timeout handed to `getUpdates`.
    pub poll_timeout_secs: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            poll_timeout_secs: 30,
        }
    }
}

impl TelegramConfig {
    /// Token text, treating a blank value as absent.
    pub fn token_str(&self) -> Option<&str> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file. Defaults to `<data_dir>/vendorwatch.db`.
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn database_path_in(&self, data_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir.join("vendorwatch.db"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Where screenshots are written before being sent. Defaults to `<data_dir>/artifacts`.
    pub dir: Option<PathBuf>,
}

impl ArtifactsConfig {
    pub fn dir_in(&self, data_dir: &Path) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| data_dir.join("artifacts"))
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
