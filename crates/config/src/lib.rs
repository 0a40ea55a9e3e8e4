//! Configuration loading, validation and env substitution.
//!
//! Config files: `vendorwatch.toml`, `vendorwatch.yaml`, or `vendorwatch.json`
//! Searched in `./` then `~/.config/vendorwatch/`.
//!
//! Supports `${ENV_VAR}` substitution anywhere in the file.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        TOKEN_ENV_VAR, apply_env_overrides, config_dir, data_dir, discover_and_load,
        find_config_file, load_config,
    },
    schema::{
        ArtifactsConfig, BrowserConfig, MonitorConfig, ProbeConfig, SelectorsConfig,
        StorageConfig, TargetConfig, TelegramConfig, VendorwatchConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
