use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error("kv {operation} on '{key}' timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        key: String,
        after: Duration,
    },

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

    /// Whether retrying later may succeed (I/O, database, timeout).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Sqlx(_) | Self::Timeout { .. })
    }
}

impl ocean_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::message(message)
    }
}

ocean_common::impl_context!();

pub type Result<T> = std::result::Result<T, Error>;
