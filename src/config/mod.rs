// src/config/mod.rs

//! Configuration loading and resolution.
//!
//! Split into:
//! - `model`: raw serde structs matching the TOML layout,
//! - `validate`: resolution into the runtime [`Config`],
//! - `loader`: file reading entry points.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ConsoleSection, DiscoverySection, LaunchSection, RawConfigFile, RunnerSection, TestSection,
    WatchSection,
};
pub use validate::{parse_duration, Config, ConsoleConfig, RunnerConfig, WatchConfig};
