// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::RawConfigFile;
use crate::config::validate::Config;
use crate::errors::Result;

/// Read and deserialize a `Testwatch.toml` without resolving it.
///
/// No semantic work happens here (pattern compilation, duration parsing,
/// deprecated aliases); use [`load_and_validate`] for a ready-to-run
/// [`Config`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and resolve it into a [`Config`].
///
/// This is the entry point the rest of the application uses. On top of
/// the raw TOML it:
///
/// - applies the documented defaults,
/// - compiles filter patterns and parses durations, rejecting bad ones,
/// - folds the deprecated `[test]` console aliases into `[console]`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = load_from_path(&path)?;
    let config = Config::try_from(raw_config)?;
    Ok(config)
}
