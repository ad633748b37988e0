//! Metric name and label definitions.

/// Command routing metrics
pub mod commands {
    /// Total command invocations received
    pub const INVOCATIONS_TOTAL: &str = "ocean_command_invocations_total";
    /// Invocations that ended in an error response
    pub const ERRORS_TOTAL: &str = "ocean_command_errors_total";
    /// Invocations short-circuited because the caller has no token
    pub const MISSING_CREDENTIAL_TOTAL: &str = "ocean_command_missing_credential_total";
    /// Handler dispatch duration in seconds
    pub const DISPATCH_DURATION_SECONDS: &str = "ocean_command_dispatch_duration_seconds";
}

/// Scheduler metrics
pub mod cron {
    /// Number of registered jobs
    pub const JOBS_REGISTERED: &str = "ocean_cron_jobs_registered";
    /// Total job executions
    pub const EXECUTIONS_TOTAL: &str = "ocean_cron_executions_total";
    /// Ticks skipped because the previous run was still in flight
    pub const SKIPPED_TOTAL: &str = "ocean_cron_skipped_total";
    /// Job errors
    pub const ERRORS_TOTAL: &str = "ocean_cron_errors_total";
    /// Job execution duration in seconds
    pub const EXECUTION_DURATION_SECONDS: &str = "ocean_cron_execution_duration_seconds";
    /// Notifications delivered to channels
    pub const NOTIFICATIONS_SENT_TOTAL: &str = "ocean_cron_notifications_sent_total";
}

/// Persistence metrics
pub mod store {
    /// KV operations by kind
    pub const OPERATIONS_TOTAL: &str = "ocean_store_operations_total";
    /// KV operations that timed out
    pub const TIMEOUTS_TOTAL: &str = "ocean_store_timeouts_total";
}

/// Common label keys
pub mod labels {
    pub const SUBCOMMAND: &str = "subcommand";
    pub const JOB: &str = "job";
    pub const OPERATION: &str = "operation";
}
