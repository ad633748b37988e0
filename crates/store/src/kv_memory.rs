//! In-memory backend. No persistence; used by tests and the `memory`
//! storage backend.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{Result, kv::KvStore};

#[derive(Default)]
pub struct InMemoryKv {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let kv = InMemoryKv::new();
        assert!(kv.get("a").await.unwrap().is_none());
        kv.set("a", b"1").await.unwrap();
        kv.set("a", b"2").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(kv.len(), 1);
        kv.delete("a").await.unwrap();
        kv.delete("a").await.unwrap();
        assert!(kv.is_empty());
    }
}
