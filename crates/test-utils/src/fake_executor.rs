use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use testwatch::engine::{EngineEvent, RunPlan};
use testwatch::errors::Result;
use testwatch::events::{EventBus, RunEvent, RunSummary, TestOutcome, TestVerdict};
use testwatch::exec::TestExecutor;

/// A fake executor that:
/// - records which test classes were "run", one list per dispatched run
/// - publishes the usual run events on the bus
/// - immediately reports `RunFinished` back to the engine.
///
/// Verdicts default to `Passed`; individual classes can be scripted to fail.
/// With a gate installed, each run waits for one `notify_one` before
/// executing, so tests can hold a run in flight deterministically.
pub struct FakeExecutor {
    engine_tx: mpsc::Sender<EngineEvent>,
    events: EventBus,
    executed: Arc<Mutex<Vec<Vec<String>>>>,
    verdicts: HashMap<String, TestVerdict>,
    gate: Option<Arc<Notify>>,
}

impl FakeExecutor {
    pub fn new(
        engine_tx: mpsc::Sender<EngineEvent>,
        events: EventBus,
        executed: Arc<Mutex<Vec<Vec<String>>>>,
    ) -> Self {
        Self {
            engine_tx,
            events,
            executed,
            verdicts: HashMap::new(),
            gate: None,
        }
    }

    /// Script a verdict for one class (default is `Passed`).
    pub fn with_verdict(mut self, class_name: &str, verdict: TestVerdict) -> Self {
        self.verdicts.insert(class_name.to_string(), verdict);
        self
    }

    /// Hold each run until the gate receives a `notify_one`.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl TestExecutor for FakeExecutor {
    fn execute(
        &mut self,
        plan: RunPlan,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.engine_tx.clone();
        let events = self.events.clone();
        let executed = Arc::clone(&self.executed);
        let verdicts = self.verdicts.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            tokio::spawn(async move {
                let run_id = plan.run_id;
                events.publish(RunEvent::RunStarted {
                    run_id,
                    trigger: plan.trigger,
                    selected: plan.selected(),
                });

                if let Some(gate) = &gate {
                    tokio::select! {
                        _ = gate.notified() => {}
                        _ = cancel.cancelled() => {}
                    }
                }

                let mut outcomes = Vec::new();
                let mut ran = Vec::new();
                let mut aborted = false;
                'phases: for phase in &plan.phases {
                    for test in &phase.tests {
                        if cancel.is_cancelled() {
                            aborted = true;
                            break 'phases;
                        }
                        let verdict = verdicts
                            .get(&test.class_name)
                            .copied()
                            .unwrap_or(TestVerdict::Passed);
                        events.publish(RunEvent::TestStarted {
                            run_id,
                            class_name: test.class_name.clone(),
                        });
                        events.publish(RunEvent::TestFinished {
                            run_id,
                            class_name: test.class_name.clone(),
                            verdict,
                            duration: Duration::ZERO,
                        });
                        outcomes.push(TestOutcome {
                            class_name: test.class_name.clone(),
                            verdict,
                            duration: Duration::ZERO,
                            output: None,
                        });
                        ran.push(test.class_name.clone());
                    }
                }

                executed.lock().unwrap().push(ran);

                let summary = RunSummary {
                    run_id,
                    trigger: plan.trigger,
                    outcomes,
                    skipped: plan.skipped.clone(),
                    duration: Duration::ZERO,
                    aborted,
                    launch_failure: None,
                };
                events.publish(RunEvent::RunFinished {
                    summary: summary.clone(),
                });
                let _ = tx.send(EngineEvent::RunFinished { run_id, summary }).await;
            });
            Ok(())
        })
    }
}

/// An executor that rejects every dispatch, for fault-path tests.
pub struct FailingExecutor;

impl TestExecutor for FailingExecutor {
    fn execute(
        &mut self,
        _plan: RunPlan,
        _cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { Err(anyhow::anyhow!("executor is wedged").into()) })
    }
}
