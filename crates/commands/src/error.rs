use thiserror::Error;

/// Argument problems detected by a handler before any cloud call is made.
/// The router shows these to the caller together with the usage line.
#[derive(Debug, Error)]
pub enum ArgError {
    #[error("missing argument <{name}>")]
    Missing { name: &'static str },

    #[error("invalid {name} '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ArgError {
    #[must_use]
    pub fn invalid(name: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
