//! Live configuration holder.
//!
//! The current config is an immutable `Arc<PluginConfig>` snapshot. Writers
//! build a complete replacement and swap the pointer under a short write
//! lock; readers clone the `Arc` under a read lock and never observe a
//! half-applied update.

use std::{
    path::Path,
    sync::{Arc, RwLock},
};

use tracing::{info, warn};

use crate::{
    Error, Result,
    loader::load_config,
    schema::PluginConfig,
    validate::{Diagnostic, validate_config},
};

pub struct ConfigManager {
    current: RwLock<Arc<PluginConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(PluginConfig::default())
    }
}

impl ConfigManager {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Latest committed snapshot.
    pub fn get(&self) -> Arc<PluginConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Replace the snapshot wholesale.
    pub fn set(&self, config: PluginConfig) {
        let next = Arc::new(config);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Clone the current snapshot, apply `f`, and swap in the result.
    ///
    /// The write lock is held across `f` so concurrent updates compose
    /// instead of overwriting each other.
    pub fn update<F: FnOnce(&mut PluginConfig)>(&self, f: F) -> Arc<PluginConfig> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = PluginConfig::clone(&guard);
        f(&mut next);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }

    /// Load, validate, and swap in the config at `path`.
    ///
    /// The current snapshot is kept when the file fails to parse or has any
    /// error-level diagnostic. Warnings are returned to the caller.
    pub fn reload_from(&self, path: &Path) -> Result<Vec<Diagnostic>> {
        let config = load_config(path)?;
        let result = validate_config(&config);
        if result.has_errors() {
            warn!(path = %path.display(), errors = %result.error_summary(), "config reload rejected");
            return Err(Error::invalid(result.error_summary()));
        }
        self.set(config);
        info!(path = %path.display(), warnings = result.diagnostics.len(), "config reloaded");
        Ok(result.diagnostics)
    }
}
