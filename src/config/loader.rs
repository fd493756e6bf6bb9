// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::model::ConfigFile;

/// Load a configuration file from a given path.
///
/// Fails if the file exists but cannot be read or parsed. Use
/// [`load_or_default`] when a missing file should fall back to defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load the daemon configuration, treating a missing file as empty.
///
/// The config file is reserved; on most installations it does not exist and
/// the built-in defaults apply. A file that exists but fails to parse is
/// still an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = ?path, "config file not found, using defaults");
        return Ok(ConfigFile::default());
    }
    load_from_path(path)
}
