// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The engine shell talks to a [`TestExecutor`] instead of spawning
//! processes itself. This makes it easy to swap in a fake executor in tests
//! while keeping the production executor implementation in [`process`].
//!
//! - [`ProcessExecutor`] is the default implementation used by `testwatch`.
//!   It runs one child process per test class and reports back via engine
//!   events.
//! - Tests can provide their own `TestExecutor` that, for example, records
//!   dispatched plans and directly emits `RunFinished` events.
//!
//! [`process`]: crate::exec::process

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::{EngineEvent, RunPlan};
use crate::errors::Result;
use crate::events::EventBus;
use crate::watchdog::WatchdogHandle;

use super::process::{run_plan, RunContext};

/// Trait abstracting how a run plan is executed.
///
/// Implementations must return promptly (real work happens in a background
/// task), honour the cancellation token at test boundaries only, and always
/// report the plan's completion with an `EngineEvent::RunFinished` carrying
/// the plan's run id, aborted or not.
pub trait TestExecutor: Send {
    fn execute(
        &mut self,
        plan: RunPlan,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor used in production: one child process per test class.
pub struct ProcessExecutor {
    context: RunContext,
}

impl ProcessExecutor {
    pub fn new(
        config: &Config,
        engine_tx: mpsc::Sender<EngineEvent>,
        events: EventBus,
        watchdog: WatchdogHandle,
    ) -> Self {
        ProcessExecutor {
            context: RunContext {
                runner: config.runner.clone(),
                launch: config.launch.clone(),
                display_test_output: config.display_test_output,
                engine_tx,
                events,
                watchdog,
            },
        }
    }
}

impl TestExecutor for ProcessExecutor {
    fn execute(
        &mut self,
        plan: RunPlan,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the context so the future doesn't borrow `self` across `await`.
        let context = self.context.clone();
        Box::pin(async move {
            tokio::spawn(run_plan(context, plan, cancel));
            Ok(())
        })
    }
}
