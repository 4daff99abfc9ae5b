// src/exec/launch.rs

//! Launch supervision for packaged artifacts.
//!
//! Framework tests can run against a packaged form of the application
//! instead of the live dev process: a runnable jar, a container image or a
//! native executable. This module owns that lifecycle:
//!
//! 1. build the launch invocation (the configured argument line goes right
//!    after the base command, before the artifact itself),
//! 2. spawn the process and scan its stdout for the readiness pattern,
//! 3. give up after the configured wait budget and kill the process,
//! 4. once ready, keep draining stdout in the background,
//! 5. shut the process down when the phase ends, no matter how it ended.
//!
//! Processes are spawned with `kill_on_drop` as a backstop, so even a
//! panicking caller cannot leak a running artifact.

use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::errors::{Result, TestwatchError};
use crate::types::ArtifactKind;

/// How a packaged artifact is launched for framework tests.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub artifact: ArtifactKind,
    /// Jar path, image name or executable path depending on `artifact`.
    pub target: String,
    /// Extra arguments inserted right after the base launch command.
    pub arg_line: Vec<String>,
    /// How long the artifact may take to report readiness.
    pub wait_time: Duration,
    /// Matched against stdout lines to detect readiness.
    pub ready_pattern: Regex,
}

/// Program and arguments used to launch `spec`.
///
/// The argument line lands immediately after the base command so JVM flags,
/// `docker run` options and native flags all end up where their launcher
/// expects them:
///
/// - jar: `java <arg_line> -jar <target>`
/// - container: `docker run <arg_line> <target>`
/// - native: `<target> <arg_line>`
pub fn launch_invocation(spec: &LaunchSpec) -> (String, Vec<String>) {
    match spec.artifact {
        ArtifactKind::Jar => {
            let mut args = spec.arg_line.clone();
            args.push("-jar".to_string());
            args.push(spec.target.clone());
            ("java".to_string(), args)
        }
        ArtifactKind::Container => {
            let mut args = vec!["run".to_string()];
            args.extend(spec.arg_line.iter().cloned());
            args.push(spec.target.clone());
            ("docker".to_string(), args)
        }
        ArtifactKind::Native => (spec.target.clone(), spec.arg_line.clone()),
    }
}

/// A launched artifact that reported readiness.
#[derive(Debug)]
pub struct LaunchedApp {
    child: Child,
    artifact: ArtifactKind,
}

impl LaunchedApp {
    /// Shut the artifact down and reap it. If this is never called, the
    /// kill-on-drop backstop still takes the process down.
    pub async fn shutdown(mut self) {
        debug!(artifact = %self.artifact, "shutting down launched artifact");
        terminate(&mut self.child, self.artifact).await;
        info!(artifact = %self.artifact, "artifact shut down");
    }

    /// Process id, if the artifact is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Launch the artifact described by `spec` and wait for readiness.
///
/// On any failure (spawn error, early exit, readiness timeout) the process
/// is killed before the error is returned; a failed launch never leaves a
/// child behind.
pub async fn launch(spec: &LaunchSpec) -> Result<LaunchedApp> {
    let (program, args) = launch_invocation(spec);
    info!(
        artifact = %spec.artifact,
        %program,
        target = %spec.target,
        "launching artifact for framework tests"
    );

    let mut child = Command::new(&program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| TestwatchError::LaunchFailed {
            artifact: spec.artifact,
            reason: format!("spawning '{program}': {err}"),
        })?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let artifact = spec.artifact;
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(%artifact, "artifact stderr: {line}");
            }
        });
    }

    let stdout = child.stdout.take();
    let started = Instant::now();
    match timeout(
        spec.wait_time,
        wait_for_ready(stdout, &spec.ready_pattern, spec.artifact),
    )
    .await
    {
        Ok(Ok(rest)) => {
            info!(
                artifact = %spec.artifact,
                elapsed = ?started.elapsed(),
                "artifact reported readiness"
            );
            drain_stdout(rest, spec.artifact);
            Ok(LaunchedApp {
                child,
                artifact: spec.artifact,
            })
        }
        Ok(Err(err)) => {
            terminate(&mut child, spec.artifact).await;
            Err(err)
        }
        Err(_elapsed) => {
            warn!(
                artifact = %spec.artifact,
                waited = ?spec.wait_time,
                "artifact did not report readiness in time; killing it"
            );
            terminate(&mut child, spec.artifact).await;
            Err(TestwatchError::LaunchTimeout {
                artifact: spec.artifact,
                waited: spec.wait_time,
            })
        }
    }
}

/// Scan stdout until a line matches the readiness pattern. Returns the
/// line reader so draining can continue after readiness.
async fn wait_for_ready(
    stdout: Option<ChildStdout>,
    ready_pattern: &Regex,
    artifact: ArtifactKind,
) -> Result<Lines<BufReader<ChildStdout>>> {
    let Some(stdout) = stdout else {
        return Err(TestwatchError::LaunchFailed {
            artifact,
            reason: "no stdout pipe to scan for readiness".to_string(),
        });
    };
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(%artifact, "artifact stdout: {line}");
                if ready_pattern.is_match(&line) {
                    return Ok(lines);
                }
            }
            Ok(None) => {
                return Err(TestwatchError::LaunchFailed {
                    artifact,
                    reason: "process exited before reporting readiness".to_string(),
                });
            }
            Err(err) => {
                return Err(TestwatchError::LaunchFailed {
                    artifact,
                    reason: format!("reading artifact stdout: {err}"),
                });
            }
        }
    }
}

/// Keep consuming stdout after readiness so the artifact never blocks on a
/// full pipe.
fn drain_stdout(mut lines: Lines<BufReader<ChildStdout>>, artifact: ArtifactKind) {
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(%artifact, "artifact stdout: {line}");
        }
    });
}

async fn terminate(child: &mut Child, artifact: ArtifactKind) {
    if let Err(err) = child.kill().await {
        // Usually means the process already exited.
        debug!(%artifact, error = %err, "kill on launched artifact failed");
    }
    match child.wait().await {
        Ok(status) => debug!(%artifact, %status, "artifact process reaped"),
        Err(err) => warn!(%artifact, error = %err, "failed to reap artifact process"),
    }
}
