// src/watch/patterns.rs

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::WatchConfig;
use crate::errors::{Result, TestwatchError};

/// Compiled watch/exclude glob patterns.
///
/// The patterns are relative to the project root; the watcher passes
/// relative paths (e.g. `"src/main/java/Foo.java"`) into [`matches`].
///
/// [`matches`]: WatchProfile::matches
#[derive(Clone)]
pub struct WatchProfile {
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile").finish_non_exhaustive()
    }
}

impl WatchProfile {
    /// Compile the `[watch]` config section.
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        let watch_set = build_globset(&config.paths)?;
        let exclude_set = if config.exclude.is_empty() {
            None
        } else {
            Some(build_globset(&config.exclude)?)
        };
        Ok(WatchProfile {
            watch_set,
            exclude_set,
        })
    }

    /// Returns true if a change to the given path (relative to project
    /// root) should trigger a test run.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|err| {
            TestwatchError::ConfigError(format!("invalid watch glob pattern '{pat}': {err}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| TestwatchError::ConfigError(format!("building watch globset: {err}")))
}
