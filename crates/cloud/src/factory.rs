//! Per-invocation client construction from stored credentials.

use std::sync::Arc;

use {
    ocean_config::{CloudConfig, ConfigManager},
    ocean_store::CredentialStore,
    secrecy::SecretString,
    thiserror::Error,
    tracing::debug,
};

use crate::client::CloudClient;

/// Builds a [`CloudClient`] for a token. The production implementation is
/// [`crate::DigitalOceanConnector`]; tests substitute fakes.
pub trait Connector: Send + Sync {
    fn connect(&self, token: SecretString, config: &CloudConfig) -> Arc<dyn CloudClient>;
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// No token on file for the user.
    #[error("no credential stored for user {user_id}")]
    MissingCredential { user_id: String },

    #[error(transparent)]
    Store(#[from] ocean_store::Error),
}

/// Produces a fresh client handle per call, bound to the caller's stored
/// token and the cloud settings current at that moment. Handles are never
/// cached across users.
#[derive(Clone)]
pub struct ClientFactory {
    credentials: CredentialStore,
    config: Arc<ConfigManager>,
    connector: Arc<dyn Connector>,
}

impl ClientFactory {
    pub fn new(
        credentials: CredentialStore,
        config: Arc<ConfigManager>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            credentials,
            config,
            connector,
        }
    }

    pub async fn resolve(&self, user_id: &str) -> Result<Arc<dyn CloudClient>, ResolveError> {
        let token = self
            .credentials
            .load_token(user_id)
            .await?
            .ok_or_else(|| ResolveError::MissingCredential {
                user_id: user_id.to_string(),
            })?;
        let config = self.config.get();
        debug!(user_id, api_base = %config.cloud.api_base, "resolved cloud client");
        Ok(self.connector.connect(token, &config.cloud))
    }
}
