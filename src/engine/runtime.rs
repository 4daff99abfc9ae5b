// src/engine/runtime.rs

use std::fmt;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, TestwatchError};
use crate::events::{EventBus, EventEnvelope, RunEvent, RunSummary};
use crate::exec::TestExecutor;
use crate::inventory::TestInventory;
use crate::types::RunMode;
use crate::watchdog::WatchdogHandle;

use super::core::CoreEngine;
use super::{EngineCommand, EngineEvent, TriggerSource};

/// Snapshot of engine state for status queries.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub mode: RunMode,
    pub in_flight: bool,
    pub last_run: Option<RunSummary>,
}

/// Drives the core engine in response to [`EngineEvent`]s, and delegates
/// run execution to a [`TestExecutor`].
///
/// This is a pure IO shell around [`CoreEngine`], which contains all the
/// scheduling semantics. This struct handles async IO: reading events from
/// channels, dispatching runs, arming the watchdog and cancelling runs.
pub struct EngineRuntime<E: TestExecutor> {
    core: CoreEngine,
    event_rx: mpsc::Receiver<EngineEvent>,
    executor: E,
    events: EventBus,
    watchdog: WatchdogHandle,
    status_tx: watch::Sender<EngineStatus>,
    active_cancel: Option<CancellationToken>,
}

impl<E: TestExecutor> fmt::Debug for EngineRuntime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRuntime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: TestExecutor> EngineRuntime<E> {
    /// Build the runtime and the status channel its handle observes.
    pub fn new(
        core: CoreEngine,
        event_rx: mpsc::Receiver<EngineEvent>,
        executor: E,
        events: EventBus,
        watchdog: WatchdogHandle,
    ) -> (Self, watch::Receiver<EngineStatus>) {
        let (status_tx, status_rx) = watch::channel(EngineStatus {
            mode: core.mode(),
            in_flight: false,
            last_run: None,
        });
        let runtime = EngineRuntime {
            core,
            event_rx,
            executor,
            events,
            watchdog,
            status_tx,
            active_cancel: None,
        };
        (runtime, status_rx)
    }

    /// Main event loop.
    ///
    /// - Consumes `EngineEvent`s from `event_rx`.
    /// - Feeds them into the pure core.
    /// - Executes commands returned by the core (dispatch runs, cancel,
    ///   notify, exit).
    pub async fn run(mut self) -> Result<()> {
        info!("testwatch engine started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("engine event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "engine received event");

            // Summaries are shell bookkeeping; the core only cares about
            // run ids.
            if let EngineEvent::RunFinished { summary, .. } = &event {
                self.watchdog.disarm();
                let summary = summary.clone();
                self.status_tx.send_modify(|status| {
                    status.last_run = Some(summary);
                });
            }

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await;
            }
            self.publish_status();

            if !step.keep_running {
                info!("core requested exit; stopping engine");
                break;
            }
        }

        self.watchdog.shutdown();
        if let Some(cancel) = self.active_cancel.take() {
            cancel.cancel();
        }
        info!("engine exiting");
        Ok(())
    }

    fn publish_status(&self) {
        self.status_tx.send_modify(|status| {
            status.mode = self.core.mode();
            status.in_flight = self.core.in_flight().is_some();
        });
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::StartRun(plan) => {
                let run_id = plan.run_id;
                let cancel = CancellationToken::new();
                self.active_cancel = Some(cancel.clone());
                self.watchdog.arm();
                debug!(run_id, selected = plan.selected(), "dispatching run to executor");
                if let Err(err) = self.executor.execute(plan, cancel).await {
                    warn!(run_id, error = %err, "executor rejected run");
                    self.watchdog.disarm();
                    self.active_cancel = None;
                    let step = self.core.step(EngineEvent::RunDispatchFailed {
                        run_id,
                        message: err.to_string(),
                    });
                    // A dispatch failure only yields notification commands,
                    // so executing them inline cannot recurse.
                    for command in step.commands {
                        self.execute_notification(command);
                    }
                }
            }
            other => self.execute_notification(other),
        }
    }

    fn execute_notification(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::CancelRun => {
                if let Some(cancel) = self.active_cancel.take() {
                    info!("cancelling in-flight run at the next test boundary");
                    cancel.cancel();
                }
                self.watchdog.disarm();
            }
            EngineCommand::NotifyModeChanged(mode) => {
                self.events.publish(RunEvent::ModeChanged { mode });
            }
            EngineCommand::NotifyFault(message) => {
                self.events.publish(RunEvent::EngineFault { message });
            }
            EngineCommand::SwitchWatchdogTimeout => {
                self.watchdog.boot_complete();
            }
            EngineCommand::RequestExit => {
                // The core already returns keep_running=false alongside
                // this; just log it.
                info!("core issued exit request");
            }
            EngineCommand::StartRun(_) => {
                debug_assert!(false, "StartRun handled in execute_command");
            }
        }
    }
}

/// Cheap, cloneable front door to a running engine.
///
/// All methods are async sends into the engine's event channel except
/// [`status`](EngineHandle::status) and
/// [`subscribe`](EngineHandle::subscribe), which read shared state.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    event_tx: mpsc::Sender<EngineEvent>,
    events: EventBus,
    status_rx: watch::Receiver<EngineStatus>,
}

impl EngineHandle {
    pub fn new(
        event_tx: mpsc::Sender<EngineEvent>,
        events: EventBus,
        status_rx: watch::Receiver<EngineStatus>,
    ) -> Self {
        EngineHandle {
            event_tx,
            events,
            status_rx,
        }
    }

    /// Ask for a test run.
    pub async fn request_run(&self, trigger: TriggerSource) -> Result<()> {
        self.send(EngineEvent::RunRequested { trigger }).await
    }

    /// Ask for a mode change. Illegal transitions are logged and ignored by
    /// the engine; they do not surface here.
    pub async fn set_mode(&self, mode: RunMode) -> Result<()> {
        self.send(EngineEvent::ModeChangeRequested { mode }).await
    }

    /// Interrupt the in-flight run at the next test boundary and drop any
    /// latched rerun.
    pub async fn stop(&self) -> Result<()> {
        self.send(EngineEvent::StopRequested).await
    }

    /// Tell the engine the host finished booting.
    pub async fn boot_completed(&self) -> Result<()> {
        self.send(EngineEvent::BootCompleted).await
    }

    /// Publish a fresh inventory; applies from the next run.
    pub async fn update_inventory(&self, inventory: TestInventory) -> Result<()> {
        self.send(EngineEvent::InventoryReloaded { inventory }).await
    }

    /// Request graceful shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(EngineEvent::ShutdownRequested).await
    }

    /// Snapshot of the current engine state.
    pub fn status(&self) -> EngineStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to the run event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    async fn send(&self, event: EngineEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| TestwatchError::EngineShutDown)
    }
}
