//! Plugin activation: opens storage, wires the credential and subscription
//! stores, the client factory, the command router and the scheduler into one
//! [`Plugin`] value, and registers the resource watcher jobs.
//!
//! ```rust,ignore
//! let plugin = Plugin::activate(config, outbound).await?;
//! let response = plugin
//!     .handle_command(&CommandInvocation::from_text("alice", "C1", "/do droplets"))
//!     .await;
//! plugin.deactivate().await;
//! ```

pub mod context;
pub mod error;
pub mod storage;
pub mod watch;

pub use {
    context::{Overrides, Plugin},
    error::{Error, Result},
    watch::{ResourceKind, ResourceWatcher},
};
