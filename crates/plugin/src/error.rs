use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration rejected: {summary}")]
    InvalidConfig { summary: String },

    #[error("failed to open {backend} storage: {source}")]
    Storage {
        backend: &'static str,
        #[source]
        source: ocean_store::Error,
    },

    #[error(transparent)]
    Cloud(#[from] ocean_cloud::CloudError),

    #[error(transparent)]
    Config(#[from] ocean_config::Error),

    #[error(transparent)]
    Scheduler(#[from] ocean_cron::Error),

    #[error("{0}")]
    Message(String),
}

impl ocean_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

ocean_common::impl_context!();
