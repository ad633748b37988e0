//! Key-value persistence trait.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;

#[cfg(feature = "metrics")]
use ocean_metrics::{counter, labels, store as store_metrics};

use crate::{Error, Result};

/// Byte-oriented key-value backend. Each single call is atomic; composite
/// read-modify-write sequences are the caller's responsibility.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Wraps a backend so that no call can block longer than `limit`.
pub struct TimedKv {
    inner: Arc<dyn KvStore>,
    limit: Duration,
}

impl TimedKv {
    pub fn new(inner: Arc<dyn KvStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T, F>(&self, operation: &'static str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        #[cfg(feature = "metrics")]
        counter!(store_metrics::OPERATIONS_TOTAL, labels::OPERATION => operation).increment(1);

        match tokio::time::timeout(self.limit, fut).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(operation, key, limit_ms = self.limit.as_millis() as u64, "kv operation timed out");
                #[cfg(feature = "metrics")]
                counter!(store_metrics::TIMEOUTS_TOTAL, labels::OPERATION => operation).increment(1);
                Err(Error::Timeout {
                    operation,
                    key: key.to_string(),
                    after: self.limit,
                })
            },
        }
    }
}

#[async_trait]
impl KvStore for TimedKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.bounded("get", key, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.bounded("set", key, self.inner.set(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.bounded("delete", key, self.inner.delete(key)).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::InMemoryKv};

    struct StallingKv;

    #[async_trait]
    impl KvStore for StallingKv {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: &[u8]) -> Result<()> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_backend_surfaces_timeout() {
        let kv = TimedKv::new(Arc::new(StallingKv), Duration::from_millis(20));
        let err = kv.get("k").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { operation: "get", .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn passes_through_fast_backend() {
        let kv = TimedKv::new(Arc::new(InMemoryKv::new()), Duration::from_secs(1));
        kv.set("k", b"v").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
        kv.delete("k").await.unwrap();
        assert!(kv.get("k").await.unwrap().is_none());
    }
}
