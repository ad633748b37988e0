//! JSON file-backed KV store with atomic writes.

use std::{collections::BTreeMap, path::PathBuf};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    tokio::{fs, sync::Mutex},
};

use crate::{
    Result,
    error::Context,
    kv::KvStore,
};

/// All entries live in one JSON object mapping key → base64 value. A mutex
/// serializes access so every operation sees and writes a whole document.
pub struct FileKv {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path).await?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    /// Atomic write: write to temp, keep a `.bak` of the previous file,
    /// rename over target.
    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let bak = self.path.with_extension("json.bak");
            let _ = fs::copy(&self.path, &bak).await;
        }

        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock().await;
        let entries = self.read_all().await?;
        entries
            .get(key)
            .map(|encoded| STANDARD.decode(encoded).map_err(Into::into))
            .transpose()
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), STANDARD.encode(value));
        self.write_all(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ocean.json");

        let kv = FileKv::new(&path);
        kv.set("do_token_alice", b"tok-123").await.unwrap();
        drop(kv);

        let reopened = FileKv::new(&path);
        assert_eq!(
            reopened.get("do_token_alice").await.unwrap(),
            Some(b"tok-123".to_vec())
        );
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path().join("absent.json"));
        assert!(kv.get("anything").await.unwrap().is_none());
        kv.delete("anything").await.unwrap();
        assert!(!dir.path().join("absent.json").exists());
    }

    #[tokio::test]
    async fn keeps_backup_of_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocean.json");
        let kv = FileKv::new(&path);
        kv.set("a", b"1").await.unwrap();
        kv.set("b", b"2").await.unwrap();
        assert!(path.with_extension("json.bak").exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocean.json");
        std::fs::write(&path, "{not json").unwrap();
        let kv = FileKv::new(&path);
        let err = kv.get("a").await.unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_keys() {
        let dir = tempfile::tempdir().unwrap();
        let kv = std::sync::Arc::new(FileKv::new(dir.path().join("ocean.json")));
        let mut handles = Vec::new();
        for i in 0..20 {
            let kv = std::sync::Arc::clone(&kv);
            handles.push(tokio::spawn(async move {
                kv.set(&format!("k{i}"), b"v").await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        for i in 0..20 {
            assert!(kv.get(&format!("k{i}")).await.unwrap().is_some());
        }
    }
}
