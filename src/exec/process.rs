// src/exec/process.rs

//! Per-test process execution.
//!
//! A run executes its phases in plan order: unit tests first, then framework
//! tests. Each test class gets its own child process built from the
//! configured runner command with `{class}` substituted. Cancellation is
//! only checked between tests, so a cancelled run always ends on a clean
//! test boundary.
//!
//! When a `[launch]` spec is configured, the framework phase is bracketed by
//! launching the packaged artifact and shutting it down again, whatever the
//! phase outcome was. A failed launch marks the phase's tests as skipped and
//! the run as launch-failed instead of erroring the whole engine.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::engine::{EngineEvent, RunPhase, RunPlan};
use crate::events::{EventBus, RunEvent, RunSummary, SkippedTest, TestOutcome, TestVerdict};
use crate::exec::launch::{self, LaunchSpec};
use crate::inventory::{TestIdentity, TestKind};
use crate::watchdog::{Activity, WatchdogHandle};

/// Everything a run execution needs, cloneable per dispatch.
#[derive(Debug, Clone)]
pub(crate) struct RunContext {
    pub(crate) runner: RunnerConfig,
    pub(crate) launch: Option<LaunchSpec>,
    pub(crate) display_test_output: bool,
    pub(crate) engine_tx: mpsc::Sender<EngineEvent>,
    pub(crate) events: EventBus,
    pub(crate) watchdog: WatchdogHandle,
}

/// Execute a whole run plan and report its completion to the engine.
pub(crate) async fn run_plan(ctx: RunContext, plan: RunPlan, cancel: CancellationToken) {
    let run_id = plan.run_id;
    let started = Instant::now();
    ctx.events.publish(RunEvent::RunStarted {
        run_id,
        trigger: plan.trigger,
        selected: plan.selected(),
    });
    info!(run_id, selected = plan.selected(), "test run started");

    let mut outcomes: Vec<TestOutcome> = Vec::new();
    let mut skipped = plan.skipped.clone();
    let mut aborted = false;
    let mut launch_failure: Option<String> = None;

    for phase in &plan.phases {
        if cancel.is_cancelled() {
            aborted = true;
            break;
        }
        ctx.watchdog
            .ping(Activity::PhaseBoundary, &phase.kind.to_string());
        debug!(run_id, kind = %phase.kind, tests = phase.tests.len(), "entering phase");

        match (&ctx.launch, phase.kind) {
            (Some(spec), TestKind::Framework) => {
                match launch::launch(spec).await {
                    Ok(app) => {
                        run_phase(&ctx, run_id, phase, &cancel, &mut outcomes, &mut aborted).await;
                        // Shutdown is unconditional; the artifact never
                        // outlives its phase.
                        app.shutdown().await;
                    }
                    Err(err) => {
                        warn!(
                            run_id,
                            error = %err,
                            "artifact launch failed; skipping framework tests"
                        );
                        launch_failure = Some(err.to_string());
                        for test in &phase.tests {
                            skipped.push(SkippedTest {
                                class_name: test.class_name.clone(),
                                reason: format!("artifact launch failed: {err}"),
                            });
                        }
                    }
                }
            }
            _ => run_phase(&ctx, run_id, phase, &cancel, &mut outcomes, &mut aborted).await,
        }
    }

    let summary = RunSummary {
        run_id,
        trigger: plan.trigger,
        outcomes,
        skipped,
        duration: started.elapsed(),
        aborted,
        launch_failure,
    };
    info!(
        run_id,
        passed = summary.passed(),
        failed = summary.failed(),
        errored = summary.errored(),
        skipped = summary.skipped.len(),
        aborted = summary.aborted,
        duration = ?summary.duration,
        "test run finished"
    );
    ctx.events.publish(RunEvent::RunFinished {
        summary: summary.clone(),
    });
    if ctx
        .engine_tx
        .send(EngineEvent::RunFinished { run_id, summary })
        .await
        .is_err()
    {
        debug!(run_id, "engine gone before run completion could be reported");
    }
}

async fn run_phase(
    ctx: &RunContext,
    run_id: u64,
    phase: &RunPhase,
    cancel: &CancellationToken,
    outcomes: &mut Vec<TestOutcome>,
    aborted: &mut bool,
) {
    for test in &phase.tests {
        if cancel.is_cancelled() {
            info!(run_id, "run cancelled at test boundary");
            *aborted = true;
            return;
        }
        outcomes.push(run_single_test(ctx, run_id, test).await);
    }
}

async fn run_single_test(ctx: &RunContext, run_id: u64, test: &TestIdentity) -> TestOutcome {
    let command = test_command(&ctx.runner, test);
    ctx.watchdog.ping(Activity::TestStarted, &test.class_name);
    ctx.events.publish(RunEvent::TestStarted {
        run_id,
        class_name: test.class_name.clone(),
    });
    debug!(run_id, class = %test.class_name, cmd = %command, "starting test process");

    let started = Instant::now();
    let (verdict, output) =
        execute_test_process(&command, &test.class_name, ctx.display_test_output, run_id).await;
    let duration = started.elapsed();

    ctx.watchdog.ping(Activity::TestFinished, &test.class_name);
    ctx.events.publish(RunEvent::TestFinished {
        run_id,
        class_name: test.class_name.clone(),
        verdict,
        duration,
    });
    match verdict {
        TestVerdict::Passed => {
            info!(run_id, class = %test.class_name, ?duration, "test passed");
        }
        TestVerdict::Failed => {
            warn!(run_id, class = %test.class_name, ?duration, "test failed");
        }
        TestVerdict::Errored => {
            error!(run_id, class = %test.class_name, "test could not be executed");
        }
    }

    // Keep output attached only when someone will want to read it.
    let keep_output = ctx.display_test_output || !verdict.is_pass();
    TestOutcome {
        class_name: test.class_name.clone(),
        verdict,
        duration,
        output: keep_output.then_some(output),
    }
}

/// Build the shell command for one test class.
fn test_command(runner: &RunnerConfig, test: &TestIdentity) -> String {
    let template = match test.kind {
        TestKind::Unit => &runner.unit_command,
        TestKind::Framework => &runner.framework_command,
    };
    template.replace("{class}", &test.class_name)
}

async fn execute_test_process(
    command: &str,
    class_name: &str,
    display_output: bool,
    run_id: u64,
) -> (TestVerdict, String) {
    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            return (
                TestVerdict::Errored,
                format!("failed to spawn test process: {err}"),
            );
        }
    };

    let output =
        capture_output(child.stdout.take(), child.stderr.take(), display_output, class_name, run_id)
            .await;

    match child.wait().await {
        Ok(status) => {
            let verdict = if status.success() {
                TestVerdict::Passed
            } else {
                TestVerdict::Failed
            };
            (verdict, output)
        }
        Err(err) => (
            TestVerdict::Errored,
            format!("{output}\nfailed to wait for test process: {err}"),
        ),
    }
}

/// Drain both pipes to EOF, optionally mirroring lines to the log as they
/// arrive. Both pipes are read concurrently so neither can fill up.
async fn capture_output(
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    display_output: bool,
    class_name: &str,
    run_id: u64,
) -> String {
    let stdout_fut = async {
        let mut buffer = String::new();
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if display_output {
                    info!(run_id, class = %class_name, "{line}");
                } else {
                    debug!(run_id, class = %class_name, "stdout: {line}");
                }
                buffer.push_str(&line);
                buffer.push('\n');
            }
        }
        buffer
    };
    let stderr_fut = async {
        let mut buffer = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if display_output {
                    info!(run_id, class = %class_name, "{line}");
                } else {
                    debug!(run_id, class = %class_name, "stderr: {line}");
                }
                buffer.push_str(&line);
                buffer.push('\n');
            }
        }
        buffer
    };

    let (out, err) = tokio::join!(stdout_fut, stderr_fut);
    if err.is_empty() {
        out
    } else {
        format!("{out}{err}")
    }
}
