use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::VendorwatchConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "vendorwatch.toml",
    "vendorwatch.yaml",
    "vendorwatch.yml",
    "vendorwatch.json",
];

/// Environment variable consulted when the config carries no bot token.
pub const TOKEN_ENV_VAR: &str = "TELEGRAM_BOT_TOKEN";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<VendorwatchConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./vendorwatch.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/vendorwatch/vendorwatch.{toml,yaml,yml,json}` (user-global)
///
/// Returns `VendorwatchConfig::default()` if no config file is found.
pub fn discover_and_load() -> VendorwatchConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    VendorwatchConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/vendorwatch/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "vendorwatch").map(|d| d.config_dir().to_path_buf())
}

/// Returns the default data directory (database and artifacts).
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "vendorwatch")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".vendorwatch"))
}

/// Fill values that may come from the environment instead of the file.
///
/// Currently only the bot token: a missing or blank `telegram.token` is taken
/// from `TELEGRAM_BOT_TOKEN`.
pub fn apply_env_overrides(config: &mut VendorwatchConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut VendorwatchConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if config.telegram.token_str().is_some() {
        return;
    }
    if let Some(token) = lookup(TOKEN_ENV_VAR).filter(|t| !t.trim().is_empty()) {
        debug!(var = TOKEN_ENV_VAR, "bot token taken from environment");
        config.telegram.token = Some(Secret::new(token));
    }
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> anyhow::Result<VendorwatchConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
