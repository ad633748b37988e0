/// Plugin configuration schema.
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration. Every section falls back to its defaults, so an empty
/// file (or no file at all) yields a usable configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Unique DigitalOcean team identifier.
    pub team_id: Option<String>,
    /// Users that are not chat-platform admins but have advanced plugin
    /// privileges (managing notification subscriptions). Accepts a list or a
    /// single comma-separated string.
    #[serde(deserialize_with = "deserialize_admins")]
    pub admins: Vec<String>,
    /// Identity whose token the background watchers use. Falls back to the
    /// first admin when unset.
    pub service_user: Option<String>,
    pub cloud: CloudConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
}

impl PluginConfig {
    /// Whether `user_id` is listed in `admins`. Ids are compared exactly.
    #[must_use]
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }

    /// The identity the scheduler polls with.
    #[must_use]
    pub fn service_identity(&self) -> Option<&str> {
        self.service_user
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                self.admins
                    .iter()
                    .map(String::as_str)
                    .find(|a| !a.trim().is_empty())
            })
    }
}

/// Cloud provider API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// REST API base URL. Defaults to "https://api.digitalocean.com".
    pub api_base: String,
    /// Per-request timeout in seconds. Defaults to 30.
    pub timeout_secs: u64,
    /// Page size for list calls. Defaults to 200 (the API maximum).
    pub page_size: u32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.digitalocean.com".into(),
            timeout_secs: 30,
            page_size: 200,
        }
    }
}

/// Background watcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether watcher jobs run at all. Defaults to true.
    pub enabled: bool,
    /// Poll schedule: `"every 5m"`, a bare duration like `"30s"`, or a
    /// 5/6-field cron expression. Defaults to "every 5m".
    pub poll: String,
    /// IANA timezone for cron expressions (e.g. "Europe/Paris").
    pub tz: Option<String>,
    /// Upper bound for one poll step. Defaults to 120.
    pub job_timeout_secs: u64,
    /// Upper bound for posting one notification. Defaults to 10.
    pub post_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll: "every 5m".into(),
            tz: None,
            job_timeout_secs: 120,
            post_timeout_secs: 10,
        }
    }
}

/// Where credentials and subscriptions are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory only; lost on restart.
    Memory,
    /// A single JSON document on disk.
    #[default]
    File,
    /// A SQLite database.
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File or database path. Defaults to `<data_dir>/ocean.json` or
    /// `<data_dir>/ocean.db` depending on the backend.
    pub path: Option<PathBuf>,
    /// Upper bound for a single KV operation. Defaults to 5.
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: None,
            timeout_secs: 5,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AdminList {
    Csv(String),
    List(Vec<String>),
}

fn deserialize_admins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match AdminList::deserialize(deserializer)? {
        AdminList::Csv(s) => s.split(',').map(str::to_string).collect(),
        AdminList::List(v) => v,
    };
    Ok(split_admins(raw))
}

/// Trim entries and drop empty ones.
pub(crate) fn split_admins(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
