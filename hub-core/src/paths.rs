//! On-disk layout under the user's home directory.
//!
//! ```text
//! ~/.hub/
//!   providers/
//!     <package>.yaml   (one manifest per provider package)
//! ```
//!
//! Every helper has an `_at(home)` form for tests and a home-derived form.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const HUB_DIR: &str = ".hub";
pub const PROVIDERS_DIR: &str = "providers";

pub fn hub_root(home: &Path) -> PathBuf {
    home.join(HUB_DIR)
}

pub fn providers_dir_at(home: &Path) -> PathBuf {
    hub_root(home).join(PROVIDERS_DIR)
}

/// `~/.hub/providers` (convenience: uses `dirs::home_dir()`).
pub fn providers_dir() -> Result<PathBuf, ConfigError> {
    Ok(providers_dir_at(&home()?))
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
