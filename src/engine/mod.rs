// src/engine/mod.rs

//! Orchestration engine for testwatch.
//!
//! This module ties together:
//! - the run-mode state machine (paused / enabled / disabled)
//! - the rerun latch (what happens when triggers arrive while a run is active)
//! - run planning (filtering the inventory into an ordered run set)
//! - the main runtime event loop that reacts to:
//!   - file-watch triggers and explicit run requests
//!   - mode change requests
//!   - run completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;

use crate::events::RunSummary;
use crate::inventory::TestInventory;
use crate::types::RunMode;

pub mod core;
pub mod mode;
pub mod plan;
pub mod queue;
pub mod runtime;

pub use core::{CoreEngine, EngineStep};
pub use mode::ModeMachine;
pub use plan::{RunPhase, RunPlan, RunPlanner};
pub use queue::RerunLatch;
pub use runtime::{EngineHandle, EngineRuntime, EngineStatus};

/// Why a test run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Initial run seeded at startup.
    Startup,
    /// A watched source file changed.
    FileChange,
    /// Explicit run-now request from the user.
    Manual,
}

impl TriggerSource {
    /// Automatic triggers are gated by the run mode; manual ones only by
    /// `disabled`.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, TriggerSource::Manual)
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Startup => write!(f, "startup"),
            TriggerSource::FileChange => write!(f, "file-change"),
            TriggerSource::Manual => write!(f, "manual"),
        }
    }
}

/// Engine options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// If true, exit the engine once no run is in flight and nothing is
    /// latched (used for `--once`).
    pub exit_when_idle: bool,
}

/// Events flowing into the engine from watchers, executors and the handle.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Someone wants a test run.
    RunRequested { trigger: TriggerSource },
    /// Someone wants the run mode changed.
    ModeChangeRequested { mode: RunMode },
    /// The executor finished (or aborted) a run.
    RunFinished { run_id: u64, summary: RunSummary },
    /// The executor could not accept a dispatched run.
    RunDispatchFailed { run_id: u64, message: String },
    /// Interrupt the in-flight run at the next test boundary.
    StopRequested,
    /// The host finished booting; the configured hang timeout applies from
    /// here on.
    BootCompleted,
    /// The discovery side published a fresh inventory.
    InventoryReloaded { inventory: TestInventory },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Hand this run to the executor.
    StartRun(RunPlan),
    /// Cancel the in-flight run at the next test boundary.
    CancelRun,
    /// Publish a mode change to subscribers.
    NotifyModeChanged(RunMode),
    /// Publish an internal fault to subscribers.
    NotifyFault(String),
    /// Switch the hang watchdog from the bootstrap timeout to the
    /// configured one.
    SwitchWatchdogTimeout,
    /// Request that the process exits (used for `--once` when idle).
    RequestExit,
}
