use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::{PluginConfig, split_admins},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["ocean.toml", "ocean.yaml", "ocean.yml", "ocean.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<PluginConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./ocean.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/ocean/ocean.{toml,yaml,yml,json}` (user-global)
///
/// Returns `PluginConfig::default()` if no file is found or the file fails
/// to parse.
pub fn discover_and_load() -> PluginConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    PluginConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .chain(
            config_dir()
                .into_iter()
                .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name))),
        )
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/ocean/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ocean").map(|d| d.config_dir().to_path_buf())
}

/// Returns the platform data directory used for default storage paths.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "ocean")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ocean"))
}

/// Apply `OCEAN_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut PluginConfig) {
    apply_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_overrides_with(config: &mut PluginConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(team) = lookup("OCEAN_TEAM_ID") {
        config.team_id = Some(team);
    }
    if let Some(admins) = lookup("OCEAN_ADMINS") {
        config.admins = split_admins(admins.split(',').map(str::to_string).collect());
    }
    if let Some(user) = lookup("OCEAN_SERVICE_USER") {
        config.service_user = Some(user);
    }
    if let Some(base) = lookup("OCEAN_API_BASE") {
        config.cloud.api_base = base;
    }
}

/// Render a config as pretty TOML.
pub fn to_toml_string(config: &PluginConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

fn parse_config(raw: &str, path: &Path) -> Result<PluginConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
