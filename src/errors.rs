// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ArtifactKind, RunMode};

#[derive(Error, Debug)]
pub enum TestwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid filter pattern '{pattern}': {source}")]
    PatternError {
        pattern: String,
        source: regex::Error,
    },

    #[error("Illegal mode transition {from} -> {to}: disabled is final for this session")]
    IllegalTransition { from: RunMode, to: RunMode },

    #[error("{artifact} artifact did not report readiness within {waited:?}")]
    LaunchTimeout {
        artifact: ArtifactKind,
        waited: Duration,
    },

    #[error("Failed to launch {artifact} artifact: {reason}")]
    LaunchFailed {
        artifact: ArtifactKind,
        reason: String,
    },

    #[error("Test inventory inconsistency: {0}")]
    DiscoveryInconsistency(String),

    #[error("Cycle detected in module graph: {0}")]
    ModuleCycle(String),

    #[error("Engine is shut down")]
    EngineShutDown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TestwatchError>;
