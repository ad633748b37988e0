//! Configuration validation.
//!
//! Checks raw TOML for unknown (likely misspelled) keys and the parsed
//! config for values the runtime cannot work with.

use crate::schema::{PluginConfig, StorageBackend};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "cloud.api_base".
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
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

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// One-line summary of all errors, used when refusing a reload.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

const ROOT_KEYS: &[&str] = &[
    "team_id",
    "admins",
    "service_user",
    "cloud",
    "scheduler",
    "storage",
];
const CLOUD_KEYS: &[&str] = &["api_base", "timeout_secs", "page_size"];
const SCHEDULER_KEYS: &[&str] = &[
    "enabled",
    "poll",
    "tz",
    "job_timeout_secs",
    "post_timeout_secs",
];
const STORAGE_KEYS: &[&str] = &["backend", "path", "timeout_secs"];

/// Semantic checks on an already-parsed config.
#[must_use]
pub fn validate_config(config: &PluginConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    match url::Url::parse(&config.cloud.api_base) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {},
        Ok(u) => diagnostics.push(Diagnostic::error(
            "cloud.api_base",
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => diagnostics.push(Diagnostic::error(
            "cloud.api_base",
            format!("invalid URL: {e}"),
        )),
    }

    for (path, value) in [
        ("cloud.timeout_secs", config.cloud.timeout_secs),
        ("scheduler.job_timeout_secs", config.scheduler.job_timeout_secs),
        (
            "scheduler.post_timeout_secs",
            config.scheduler.post_timeout_secs,
        ),
        ("storage.timeout_secs", config.storage.timeout_secs),
    ] {
        if value == 0 {
            diagnostics.push(Diagnostic::error(path, "must be greater than 0"));
        }
    }

    if config.cloud.page_size == 0 || config.cloud.page_size > 200 {
        diagnostics.push(Diagnostic::error(
            "cloud.page_size",
            "must be between 1 and 200",
        ));
    }

    if config.scheduler.poll.trim().is_empty() {
        diagnostics.push(Diagnostic::error("scheduler.poll", "empty poll schedule"));
    }

    if config.admins.iter().any(|a| a.trim().is_empty()) {
        diagnostics.push(Diagnostic::warning("admins", "blank admin entry is ignored"));
    }

    if config.scheduler.enabled && config.service_identity().is_none() {
        diagnostics.push(Diagnostic::warning(
            "service_user",
            "scheduler is enabled but neither service_user nor admins is set; watchers will not poll",
        ));
    }

    if config.storage.backend == StorageBackend::Memory {
        diagnostics.push(Diagnostic::warning(
            "storage.backend",
            "memory backend loses tokens and subscriptions on restart",
        ));
    }

    ValidationResult { diagnostics }
}

/// Validate raw TOML: syntax, unknown keys, types, then semantics.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic::error("", format!("TOML syntax error: {e}"))],
            };
        },
    };

    let mut diagnostics = Vec::new();
    if let Some(table) = value.as_table() {
        check_keys(table, "", ROOT_KEYS, &mut diagnostics);
        for (section, known) in [
            ("cloud", CLOUD_KEYS),
            ("scheduler", SCHEDULER_KEYS),
            ("storage", STORAGE_KEYS),
        ] {
            if let Some(sub) = table.get(section).and_then(|v| v.as_table()) {
                check_keys(sub, section, known, &mut diagnostics);
            }
        }
    }

    match toml::from_str::<PluginConfig>(toml_str) {
        Ok(config) => diagnostics.extend(validate_config(&config).diagnostics),
        Err(e) => diagnostics.push(Diagnostic::error("", format!("type error: {e}"))),
    }

    ValidationResult { diagnostics }
}

fn check_keys(
    table: &toml::map::Map<String, toml::Value>,
    prefix: &str,
    known: &[&str],
    diagnostics: &mut Vec<Diagnostic>,
) {
    for key in table.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let message = match suggest(key, known) {
            Some(hint) => format!("unknown field (did you mean '{hint}'?)"),
            None => "unknown field".to_string(),
        };
        diagnostics.push(Diagnostic::warning(&path, message));
    }
}

/// Closest known key within edit distance 2.
fn suggest<'a>(needle: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= 2)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

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
