// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running tests as child processes,
//! using `tokio::process::Command`, and reporting back to the orchestration
//! engine via `EngineEvent`s.
//!
//! - [`backend`] provides the `TestExecutor` trait and the concrete
//!   `ProcessExecutor` the engine uses in production, which tests can
//!   replace with a fake implementation.
//! - [`process`] owns the per-run execution loop and per-test process
//!   handling.
//! - [`launch`] supervises packaged artifacts for framework test phases.

pub mod backend;
pub mod launch;
pub mod process;

pub use backend::{ProcessExecutor, TestExecutor};
pub use launch::{launch_invocation, LaunchSpec, LaunchedApp};
