use std::time::Duration;

use thiserror::Error;

/// Failures from cloud provider calls.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Token missing, invalid or revoked (HTTP 401/403).
    #[error("authentication rejected: {message}")]
    Auth { message: String },

    /// HTTP 429.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("provider error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{message}")]
    Message { message: String },
}

impl CloudError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Network trouble, rate limits and provider 5xx: the same call may
    /// succeed later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(CloudError::RateLimited { retry_after: None }, true)]
    #[case(CloudError::Timeout { after: Duration::from_secs(30) }, true)]
    #[case(CloudError::Api { status: 503, message: "down".into() }, true)]
    #[case(CloudError::Api { status: 422, message: "bad".into() }, false)]
    #[case(CloudError::Auth { message: "nope".into() }, false)]
    #[case(CloudError::NotFound { message: "gone".into() }, false)]
    fn transient_classification(#[case] err: CloudError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }
}
