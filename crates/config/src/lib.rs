//! Plugin configuration: schema, loading, env substitution, validation and
//! the live [`ConfigManager`].
//!
//! Config files: `ocean.toml`, `ocean.yaml`, `ocean.yml` or `ocean.json`,
//! searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod manager;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        load_config, to_toml_string,
    },
    manager::ConfigManager,
    schema::{CloudConfig, PluginConfig, SchedulerConfig, StorageBackend, StorageConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate_config, validate_toml_str},
};
