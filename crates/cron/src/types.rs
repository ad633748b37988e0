//! Core data types for the job scheduler.

use std::{future::Future, pin::Pin, sync::Arc};

use {
    ocean_config::PluginConfig,
    serde::{Deserialize, Serialize},
};

/// How a job is scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JobSchedule {
    /// Fixed interval in milliseconds, measured from the end of each wait.
    Every { every_ms: u64 },
    /// Cron expression (5-field standard or 6-field with seconds).
    Cron {
        expr: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
    },
}

/// One message for every subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
}

impl Notification {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A job's work for one tick: given the config snapshot current at the
/// tick, produce the notifications to fan out.
pub type JobActionFn = Arc<
    dyn Fn(Arc<PluginConfig>) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Notification>>> + Send>>
        + Send
        + Sync,
>;

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Ok,
    Error,
    /// The previous run was still in flight.
    Skipped,
}

/// In-memory runtime state of a job. Reset on restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<RunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<u64>,
    pub runs: u64,
    pub skipped: u64,
    pub notifications_sent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,
    pub schedule: JobSchedule,
    pub running: bool,
    pub state: JobState,
}

/// Summary status of the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobInfo>,
}

impl SchedulerStatus {
    pub fn job(&self, name: &str) -> Option<&JobInfo> {
        self.jobs.iter().find(|j| j.name == name)
    }
}
