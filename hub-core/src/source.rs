//! YAML configuration source.
//!
//! The validator itself is format-agnostic; this module is the default
//! collaborator that turns an `agents.yaml`-style file into a
//! [`RawDescription`].

use std::path::{Path, PathBuf};

use crate::config::{load_with_settings, Configuration};
use crate::error::{io_err, ConfigError};
use crate::raw::RawDescription;
use crate::settings::Settings;

pub const CONFIG_FILE_SETTING: &str = "AGENTS_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "agents.yaml";

/// `AGENTS_CONFIG_FILE` if set, otherwise `agents.yaml` in the working directory.
pub fn config_path(settings: &Settings) -> PathBuf {
    PathBuf::from(
        settings
            .get(CONFIG_FILE_SETTING)
            .unwrap_or(DEFAULT_CONFIG_FILE),
    )
}

/// Read and parse the description at `path` without validating it.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Empty` for a
/// blank file, and `ConfigError::Parse` (with path + line context) for
/// malformed YAML.
pub fn read_description_at(path: &Path) -> Result<RawDescription, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read, parse and validate the description at `path`.
pub fn load_file_at(path: &Path, settings: &Settings) -> Result<Configuration, ConfigError> {
    let raw = read_description_at(path)?;
    Ok(load_with_settings(&raw, settings)?)
}
