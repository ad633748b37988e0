use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid cron expression '{expr}': {source}")]
    InvalidCron {
        expr: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("invalid schedule '{input}': {reason}")]
    InvalidSchedule { input: String, reason: String },

    #[error("unknown timezone: {timezone}")]
    UnknownTimezone { timezone: String },

    #[error("job not found: {name}")]
    JobNotFound { name: String },

    #[error("job already registered: {name}")]
    DuplicateJob { name: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_schedule(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            input: input.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn job_not_found(name: impl Into<String>) -> Self {
        Self::JobNotFound { name: name.into() }
    }

    #[must_use]
    pub fn unknown_timezone(timezone: impl Into<String>) -> Self {
        Self::UnknownTimezone {
            timezone: timezone.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
