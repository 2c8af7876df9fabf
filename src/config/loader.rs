// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GraphConfig, RawGraphConfig};
use crate::errors::Result;

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = contents.len(), "read graph config");
    load_from_str(&contents)
}

/// Deserialize a config from TOML text without semantic validation.
pub fn load_from_str(contents: &str) -> Result<RawGraphConfig> {
    let config: RawGraphConfig = toml::from_str(contents)?;
    Ok(config)
}

/// Load a config file and validate it.
///
/// Rejects unknown step references, name collisions between tasks and
/// flows, flows that include themselves, gate expressions that do not parse
/// or that read tasks not yet added, and an ambiguous root.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphConfig> {
    let raw = load_from_path(&path)?;
    GraphConfig::try_from(raw)
}

/// `Taskflow.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskflow.toml")
}
