//! Per-user API token storage.

use std::sync::Arc;

use {
    secrecy::{ExposeSecret, SecretString},
    tracing::{debug, error},
};

use crate::{Result, kv::KvStore};

/// Key namespace for user tokens.
const TOKEN_KEY_PREFIX: &str = "do_token_";

/// Stores one token per user id. No validation happens here: a bad token
/// only surfaces when a cloud call is made with it.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(user_id: &str) -> String {
        format!("{TOKEN_KEY_PREFIX}{user_id}")
    }

    /// The user's token, or `None` when nothing (or an empty value) is on
    /// file. Absence is an expected outcome, not an error.
    pub async fn load_token(&self, user_id: &str) -> Result<Option<SecretString>> {
        let Some(bytes) = self.kv.get(&Self::key(user_id)).await? else {
            return Ok(None);
        };
        match String::from_utf8(bytes) {
            Ok(token) if token.trim().is_empty() => Ok(None),
            Ok(token) => Ok(Some(SecretString::new(token))),
            Err(_) => {
                error!(user_id, "stored token is not valid UTF-8; treating as absent");
                Ok(None)
            },
        }
    }

    /// Overwrites any existing token.
    pub async fn store_token(&self, user_id: &str, token: &SecretString) -> Result<()> {
        self.kv
            .set(&Self::key(user_id), token.expose_secret().as_bytes())
            .await?;
        debug!(user_id, "stored token");
        Ok(())
    }

    /// Deleting a token that was never stored succeeds.
    pub async fn delete_token(&self, user_id: &str) -> Result<()> {
        self.kv.delete(&Self::key(user_id)).await?;
        debug!(user_id, "deleted token");
        Ok(())
    }
}
