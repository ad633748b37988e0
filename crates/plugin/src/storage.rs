//! Storage backend selection.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    ocean_config::{StorageBackend, StorageConfig, data_dir},
    ocean_store::{FileKv, InMemoryKv, KvStore, SqliteKv, TimedKv},
    tracing::info,
};

use crate::{Error, Result};

const FILE_NAME: &str = "ocean.json";
const SQLITE_NAME: &str = "ocean.db";

/// Where the configured backend keeps its data. `None` for memory.
pub fn storage_path(config: &StorageConfig) -> Option<PathBuf> {
    let default_name = match config.backend {
        StorageBackend::Memory => return None,
        StorageBackend::File => FILE_NAME,
        StorageBackend::Sqlite => SQLITE_NAME,
    };
    Some(
        config
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join(default_name)),
    )
}

/// Open the configured backend, bounded by `storage.timeout_secs` per call.
pub async fn open_kv(config: &StorageConfig) -> Result<Arc<dyn KvStore>> {
    let path = storage_path(config);
    let inner: Arc<dyn KvStore> = match (&config.backend, path) {
        (StorageBackend::Sqlite, Some(path)) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|e| Error::Storage {
                    backend: "sqlite",
                    source: ocean_store::Error::Io(e),
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            let kv = SqliteKv::new(&url).await.map_err(|source| Error::Storage {
                backend: "sqlite",
                source,
            })?;
            info!(path = %path.display(), "using sqlite storage");
            Arc::new(kv)
        },
        (StorageBackend::File, Some(path)) => {
            info!(path = %path.display(), "using file storage");
            Arc::new(FileKv::new(path))
        },
        _ => {
            info!("using in-memory storage; data is lost on exit");
            Arc::new(InMemoryKv::new())
        },
    };
    Ok(wrap(inner, config))
}

/// Apply the configured per-call timeout to any backend.
pub fn wrap(inner: Arc<dyn KvStore>, config: &StorageConfig) -> Arc<dyn KvStore> {
    Arc::new(TimedKv::new(
        inner,
        Duration::from_secs(config.timeout_secs.max(1)),
    ))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_follow_backend() {
        let memory = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        assert!(storage_path(&memory).is_none());

        let sqlite = StorageConfig {
            backend: StorageBackend::Sqlite,
            ..Default::default()
        };
        assert!(storage_path(&sqlite).unwrap().ends_with(SQLITE_NAME));

        let explicit = StorageConfig {
            backend: StorageBackend::File,
            path: Some(PathBuf::from("/tmp/custom.json")),
            ..Default::default()
        };
        assert_eq!(
            storage_path(&explicit).unwrap(),
            PathBuf::from("/tmp/custom.json")
        );
    }

    #[tokio::test]
    async fn file_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::File,
            path: Some(dir.path().join("kv.json")),
            ..Default::default()
        };
        open_kv(&config).await.unwrap().set("k", b"v").await.unwrap();
        let reopened = open_kv(&config).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
    }

    #[tokio::test]
    async fn sqlite_backend_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some(dir.path().join("nested").join("ocean.db")),
            ..Default::default()
        };
        let kv = open_kv(&config).await.unwrap();
        kv.set("k", b"v").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
    }
}
