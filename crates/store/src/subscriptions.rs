//! The singleton subscription record: channels that receive watcher
//! notifications.

use std::{collections::BTreeSet, sync::Arc};

use {
    ocean_common::ChannelId,
    serde::{Deserialize, Serialize},
    tokio::sync::Mutex,
    tracing::{error, info},
};

use crate::{Result, kv::KvStore};

const SUBSCRIPTION_KEY: &str = "subscriptions";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub channels: BTreeSet<ChannelId>,
}

impl Subscription {
    pub fn contains(&self, channel_id: &str) -> bool {
        self.channels.contains(channel_id)
    }
}

/// Persists the subscription as one JSON value under a fixed key.
///
/// `add_channel` / `remove_channel` are load-modify-save sequences; they are
/// serialized by `mutation_lock` so concurrent callers cannot lose updates.
/// Share one instance (behind an `Arc`) per plugin.
pub struct SubscriptionStore {
    kv: Arc<dyn KvStore>,
    mutation_lock: Mutex<()>,
}

impl SubscriptionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            mutation_lock: Mutex::new(()),
        }
    }

    /// Current subscription; empty when none was ever stored.
    ///
    /// A malformed stored record is logged and read as empty.
    pub async fn load(&self) -> Result<Subscription> {
        let Some(bytes) = self.kv.get(SUBSCRIPTION_KEY).await? else {
            return Ok(Subscription::default());
        };
        match serde_json::from_slice(&bytes) {
            Ok(sub) => Ok(sub),
            Err(e) => {
                error!(error = %e, "stored subscription record is malformed; using empty set");
                Ok(Subscription::default())
            },
        }
    }

    /// Replace the whole record.
    pub async fn save(&self, subscription: &Subscription) -> Result<()> {
        let bytes = serde_json::to_vec(subscription)?;
        self.kv.set(SUBSCRIPTION_KEY, &bytes).await
    }

    /// Write an empty record if none exists. Returns `true` when one was
    /// created.
    pub async fn ensure_initialized(&self) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        if self.kv.get(SUBSCRIPTION_KEY).await?.is_some() {
            return Ok(false);
        }
        self.save(&Subscription::default()).await?;
        info!("created empty subscription record");
        Ok(true)
    }

    /// Returns `true` if the channel was newly added.
    pub async fn add_channel(&self, channel_id: &str) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        let mut sub = self.load().await?;
        if !sub.channels.insert(channel_id.to_string()) {
            return Ok(false);
        }
        self.save(&sub).await?;
        info!(channel_id, total = sub.channels.len(), "channel subscribed");
        Ok(true)
    }

    /// Returns `true` if the channel was present. Removing an absent channel
    /// is a no-op.
    pub async fn remove_channel(&self, channel_id: &str) -> Result<bool> {
        let _guard = self.mutation_lock.lock().await;
        let mut sub = self.load().await?;
        if !sub.channels.remove(channel_id) {
            return Ok(false);
        }
        self.save(&sub).await?;
        info!(channel_id, total = sub.channels.len(), "channel unsubscribed");
        Ok(true)
    }
}
