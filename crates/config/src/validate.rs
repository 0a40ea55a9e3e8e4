//! Configuration validation engine.
//!
//! Flags unknown/misspelled keys in TOML files and semantic problems (missing
//! bot token, bad timezone, unusable target URL, zero intervals) in the parsed
//! configuration.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{loader, schema::VendorwatchConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "missing", "invalid"
    pub category: &'static str,
    /// Dotted path, e.g. "monitor.timezone"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let leaves = |names: &[&'static str]| Struct(names.iter().map(|n| (*n, Leaf)).collect());

    Struct(HashMap::from([
        (
            "target",
            Struct(HashMap::from([
                ("url", Leaf),
                ("quota_phrase", Leaf),
                (
                    "selectors",
                    leaves(&[
                        "beneficiary_input",
                        "search_button_text",
                        "search_vendor_button",
                        "quota_message",
                        "vendor_select",
                    ]),
                ),
            ])),
        ),
        (
            "probe",
            leaves(&[
                "page_load_timeout_secs",
                "ready_timeout_secs",
                "settle_delay_ms",
                "evidence_timeout_secs",
                "redraw_delay_ms",
            ]),
        ),
        (
            "browser",
            leaves(&[
                "chrome_path",
                "headless",
                "viewport_width",
                "viewport_height",
                "chrome_args",
                "user_agent",
            ]),
        ),
        (
            "monitor",
            leaves(&[
                "interval_secs",
                "initial_delay_secs",
                "registration_check_delay_secs",
                "timezone",
                "max_concurrent_probes",
            ]),
        ),
        ("telegram", leaves(&["token", "poll_timeout_secs"])),
        ("storage", leaves(&["database_path"])),
        ("artifacts", leaves(&["dir"])),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered one if `path`
/// is `None`. Semantic checks run after env overrides, so a token supplied via
/// `TELEGRAM_BOT_TOKEN` counts as present.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(loader::find_config_file);

    let Some(actual_path) = config_path else {
        let mut config = VendorwatchConfig::default();
        loader::apply_env_overrides(&mut config);
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults",
        )];
        diagnostics.extend(check_semantics(&config));
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let raw = match std::fs::read_to_string(&actual_path) {
        Ok(raw) => crate::env_subst::substitute_env(&raw),
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("failed to read config file: {e}"),
                )],
                config_path: Some(actual_path),
            };
        },
    };

    let mut diagnostics = Vec::new();
    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");
    if is_toml {
        match toml::from_str::<toml::Value>(&raw) {
            Ok(value) => check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics),
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("TOML syntax error: {e}"),
                ));
                return ValidationResult {
                    diagnostics,
                    config_path: Some(actual_path),
                };
            },
        }
    }

    match loader::parse_config(&raw, &actual_path) {
        Ok(mut config) => {
            loader::apply_env_overrides(&mut config);
            diagnostics.extend(check_semantics(&config));
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: Some(actual_path),
    }
}

/// Validate a TOML string without file-system or environment side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<VendorwatchConfig>(toml_str) {
        Ok(config) => diagnostics.extend(check_semantics(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known: Vec<&str> = fields.keys().copied().collect();
    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child, child_schema, &path, diagnostics);
            continue;
        }
        let message = match suggest(key, &known, 3) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".to_string(),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-field",
            path,
            message,
        ));
    }
}

/// Semantic checks on a parsed configuration.
#[must_use]
pub fn check_semantics(config: &VendorwatchConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.telegram.token_str().is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "missing",
            "telegram.token",
            "bot token is empty; set telegram.token or TELEGRAM_BOT_TOKEN",
        ));
    }

    if config.monitor.timezone.parse::<chrono_tz::Tz>().is_err() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "monitor.timezone",
            format!("unknown time zone \"{}\"", config.monitor.timezone),
        ));
    }

    match url::Url::parse(&config.target.url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {},
        Ok(u) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "target.url",
            format!("unsupported scheme \"{}\"; expected http or https", u.scheme()),
        )),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "target.url",
            format!("not a valid URL: {e}"),
        )),
    }

    if config.monitor.interval_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "monitor.interval_secs",
            "interval must be greater than zero",
        ));
    }

    if config.monitor.max_concurrent_probes == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "monitor.max_concurrent_probes",
            "at least one probe must be allowed",
        ));
    }

    if config.target.quota_phrase.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "target.quota_phrase",
            "empty quota phrase matches every dialog, so nothing could resolve as available",
        ));
    }

    if config.monitor.max_concurrent_probes > 4 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "invalid",
            "monitor.max_concurrent_probes",
            "each probe runs its own Chrome; high concurrency is memory hungry",
        ));
    }

    diagnostics
}
