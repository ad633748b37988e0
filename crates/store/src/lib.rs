//! Persistence for the plugin: a small key-value abstraction with memory,
//! file and SQLite backends, and the two stores built on it.
//!
//! - [`CredentialStore`]: one API token per user.
//! - [`SubscriptionStore`]: the singleton set of channels receiving
//!   watcher notifications.

pub mod credentials;
pub mod error;
pub mod kv;
pub mod kv_file;
pub mod kv_memory;
pub mod kv_sqlite;
pub mod subscriptions;

pub use {
    credentials::CredentialStore,
    error::{Error, Result},
    kv::{KvStore, TimedKv},
    kv_file::FileKv,
    kv_memory::InMemoryKv,
    kv_sqlite::SqliteKv,
    subscriptions::{Subscription, SubscriptionStore},
};

/// Run database migrations for the SQLite backend.
///
/// Creates the `plugin_kv` table. Called by [`SqliteKv::new`]; call it
/// yourself before [`SqliteKv::with_pool`] on a shared pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
