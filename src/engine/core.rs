// src/engine/core.rs

//! Pure core engine state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`EngineEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::EngineRuntime`) is
//! responsible for:
//! - reading events from channels
//! - handing run plans to the executor
//! - arming the hang watchdog and cancelling runs
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.
//!
//! Scheduling rules enforced here:
//! - at most one run in flight,
//! - triggers arriving mid-run collapse into one pending rerun,
//! - mode gating happens both when a trigger arrives and again when a
//!   latched rerun is about to start,
//! - internal inconsistencies disable the engine instead of wedging it.

use tracing::{debug, error, info};

use crate::types::RunMode;

use super::mode::ModeMachine;
use super::plan::RunPlanner;
use super::queue::RerunLatch;
use super::{EngineCommand, EngineEvent, EngineOptions, TriggerSource};

/// Decision returned by the core after handling a single [`EngineEvent`].
#[derive(Debug, Clone)]
pub struct EngineStep {
    /// Commands the IO shell should execute (start runs, cancel, exit).
    pub commands: Vec<EngineCommand>,
    /// Whether the outer engine loop should keep running.
    pub keep_running: bool,
}

impl EngineStep {
    fn advance(commands: Vec<EngineCommand>) -> Self {
        EngineStep {
            commands,
            keep_running: true,
        }
    }

    fn idle() -> Self {
        EngineStep::advance(Vec::new())
    }
}

/// Pure core engine state.
///
/// This owns:
/// - the mode state machine
/// - the run planner (filter + inventory)
/// - the rerun latch
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreEngine {
    mode: ModeMachine,
    planner: RunPlanner,
    rerun: RerunLatch,
    options: EngineOptions,
    run_counter: u64,
    in_flight: Option<u64>,
    /// A cancellation was already issued for the in-flight run.
    stopping: bool,
}

impl CoreEngine {
    pub fn new(initial_mode: RunMode, planner: RunPlanner, options: EngineOptions) -> Self {
        CoreEngine {
            mode: ModeMachine::new(initial_mode),
            planner,
            rerun: RerunLatch::new(),
            options,
            run_counter: 0,
            in_flight: None,
            stopping: false,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode.mode()
    }

    /// Expose the in-flight run id (for the shell and tests).
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Expose latch state (for tests).
    pub fn rerun_pending(&self) -> bool {
        !self.rerun.is_empty()
    }

    /// Handle a single engine event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: EngineEvent) -> EngineStep {
        match event {
            EngineEvent::RunRequested { trigger } => self.handle_run_request(trigger),
            EngineEvent::ModeChangeRequested { mode } => self.handle_mode_change(mode),
            EngineEvent::RunFinished { run_id, .. } => self.handle_run_finished(run_id),
            EngineEvent::RunDispatchFailed { run_id, message } => {
                self.handle_fault(format!("run {run_id} could not be dispatched: {message}"))
            }
            EngineEvent::StopRequested => self.handle_stop(),
            EngineEvent::BootCompleted => {
                EngineStep::advance(vec![EngineCommand::SwitchWatchdogTimeout])
            }
            EngineEvent::InventoryReloaded { inventory } => {
                info!(tests = inventory.len(), "test inventory reloaded");
                self.planner.set_inventory(inventory);
                EngineStep::idle()
            }
            EngineEvent::ShutdownRequested => {
                let mut commands = Vec::new();
                if self.in_flight.is_some() {
                    commands.push(EngineCommand::CancelRun);
                }
                EngineStep {
                    commands,
                    keep_running: false,
                }
            }
        }
    }

    fn handle_run_request(&mut self, trigger: TriggerSource) -> EngineStep {
        if !self.mode.permits(trigger) {
            debug!(
                %trigger,
                mode = %self.mode.mode(),
                "trigger not runnable in current mode; ignoring"
            );
            return self.after_ignored_trigger();
        }

        if self.in_flight.is_some() {
            self.rerun.record(trigger);
            return EngineStep::idle();
        }

        self.start_run(trigger)
    }

    /// A trigger the mode swallowed still counts as "nothing left to do"
    /// for `--once`.
    fn after_ignored_trigger(&mut self) -> EngineStep {
        if self.options.exit_when_idle && self.in_flight.is_none() && self.rerun.is_empty() {
            return EngineStep {
                commands: vec![EngineCommand::RequestExit],
                keep_running: false,
            };
        }
        EngineStep::idle()
    }

    fn start_run(&mut self, trigger: TriggerSource) -> EngineStep {
        self.run_counter += 1;
        let plan = self.planner.build_plan(self.run_counter, trigger);
        if plan.is_empty() {
            info!(run_id = plan.run_id, %trigger, "no tests selected for this run");
        } else {
            info!(
                run_id = plan.run_id,
                %trigger,
                selected = plan.selected(),
                "starting test run"
            );
        }
        // Empty plans still go through the executor so completion and
        // idle-exit work the same way for every run.
        self.in_flight = Some(plan.run_id);
        self.stopping = false;
        EngineStep::advance(vec![EngineCommand::StartRun(plan)])
    }

    fn handle_run_finished(&mut self, run_id: u64) -> EngineStep {
        if self.in_flight != Some(run_id) {
            return self.handle_fault(format!(
                "completion reported for unknown run {run_id} (in flight: {:?})",
                self.in_flight
            ));
        }
        self.in_flight = None;
        self.stopping = false;

        if let Some(trigger) = self.rerun.take() {
            // Mode may have changed while the run was in flight; gate again.
            if self.mode.permits(trigger) {
                debug!(%trigger, "starting latched rerun");
                return self.start_run(trigger);
            }
            debug!(
                %trigger,
                mode = %self.mode.mode(),
                "dropping latched rerun; mode no longer permits it"
            );
        }

        if self.options.exit_when_idle {
            return EngineStep {
                commands: vec![EngineCommand::RequestExit],
                keep_running: false,
            };
        }
        EngineStep::idle()
    }

    fn handle_mode_change(&mut self, to: RunMode) -> EngineStep {
        match self.mode.request(to) {
            Ok(change) => {
                let mut commands = Vec::new();
                if !change.is_noop() {
                    info!(from = %change.from, to = %change.to, "run mode changed");
                    commands.push(EngineCommand::NotifyModeChanged(change.to));
                }
                if change.to == RunMode::Disabled {
                    self.rerun.clear();
                    if self.in_flight.is_some() && !self.stopping {
                        self.stopping = true;
                        commands.push(EngineCommand::CancelRun);
                    }
                }
                EngineStep::advance(commands)
            }
            Err(err) => {
                // Rejected transitions log and change nothing; the session
                // stays disabled.
                tracing::warn!(error = %err, "mode change rejected");
                EngineStep::idle()
            }
        }
    }

    fn handle_stop(&mut self) -> EngineStep {
        self.rerun.clear();
        if self.in_flight.is_some() && !self.stopping {
            self.stopping = true;
            return EngineStep::advance(vec![EngineCommand::CancelRun]);
        }
        EngineStep::idle()
    }

    /// Internal inconsistency: disable the engine rather than guessing at
    /// recovery. The process stays up so state remains inspectable.
    fn handle_fault(&mut self, message: String) -> EngineStep {
        error!(%message, "engine fault; disabling continuous testing");
        self.in_flight = None;
        self.stopping = false;
        self.rerun.clear();
        let changed = self.mode.force_disable();
        let mut commands = vec![EngineCommand::NotifyFault(message)];
        if changed {
            commands.push(EngineCommand::NotifyModeChanged(RunMode::Disabled));
        }
        EngineStep::advance(commands)
    }
}
