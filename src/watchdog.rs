// src/watchdog.rs

//! Hang detection for in-flight test runs.
//!
//! A single long-lived timer task watches a rolling deadline. Every piece of
//! run activity (run armed, test started, test finished, phase boundary)
//! pushes the deadline out by the active timeout. If the deadline passes
//! with no activity, the watchdog logs a diagnostic dump, publishes it on
//! the event bus and re-arms for the next window. It never cancels or fails
//! the run; runs only end through their own completion or an explicit stop.
//!
//! Two timeout phases exist: until the host reports boot completion, a
//! bootstrap timeout applies (overridable via `TESTWATCH_HANG_TIMEOUT`);
//! afterwards the configured `[test].hang_detection_timeout` takes over.
//!
//! The deadline arithmetic lives in [`WatchdogState`], which is pure and
//! directly testable; the timer task is a thin shell around it.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::parse_duration;
use crate::events::{EventBus, RunEvent};

/// Bootstrap timeout applied before boot completion, unless overridden via
/// [`HANG_TIMEOUT_ENV`].
pub const DEFAULT_HANG_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Environment variable overriding the bootstrap timeout (same format as
/// the config value, e.g. `30s` or `10m`).
pub const HANG_TIMEOUT_ENV: &str = "TESTWATCH_HANG_TIMEOUT";

/// Which timeout value is currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Bootstrap,
    Configured,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Bootstrap => write!(f, "bootstrap"),
            TimeoutPhase::Configured => write!(f, "configured"),
        }
    }
}

/// What kind of run activity pushed the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    TestStarted,
    TestFinished,
    PhaseBoundary,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::TestStarted => write!(f, "test started"),
            Activity::TestFinished => write!(f, "test finished"),
            Activity::PhaseBoundary => write!(f, "phase boundary"),
        }
    }
}

/// Diagnostic snapshot produced when the watchdog fires.
#[derive(Debug, Clone)]
pub struct HangDump {
    /// How long the run has been quiet.
    pub quiet_for: Duration,
    pub phase: TimeoutPhase,
    /// Description of the last observed activity, if any.
    pub last_activity: Option<String>,
    /// Captured backtrace of the watchdog task, as a starting point for
    /// figuring out what the run is stuck on.
    pub backtrace: String,
}

/// Pure deadline arithmetic for the watchdog.
#[derive(Debug)]
pub struct WatchdogState {
    bootstrap: Duration,
    configured: Duration,
    phase: TimeoutPhase,
    armed: bool,
    deadline: Option<Instant>,
    last_activity: Option<String>,
    last_activity_at: Option<Instant>,
}

impl WatchdogState {
    pub fn new(bootstrap: Duration, configured: Duration) -> Self {
        WatchdogState {
            bootstrap,
            configured,
            phase: TimeoutPhase::Bootstrap,
            armed: false,
            deadline: None,
            last_activity: None,
            last_activity_at: None,
        }
    }

    /// The timeout for the current phase.
    pub fn timeout(&self) -> Duration {
        match self.phase {
            TimeoutPhase::Bootstrap => self.bootstrap,
            TimeoutPhase::Configured => self.configured,
        }
    }

    pub fn phase(&self) -> TimeoutPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Deadline the timer task should sleep until; `None` while disarmed.
    pub fn deadline(&self) -> Option<Instant> {
        if self.armed { self.deadline } else { None }
    }

    /// Arm for a fresh run starting now.
    pub fn arm(&mut self, now: Instant) {
        self.armed = true;
        self.deadline = Some(now + self.timeout());
        self.last_activity = None;
        self.last_activity_at = Some(now);
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.deadline = None;
    }

    /// Push the deadline out after observed run activity. No-op while
    /// disarmed (activity can race a disarm; late pings must not re-arm).
    pub fn record_activity(&mut self, now: Instant, description: String) {
        if !self.armed {
            return;
        }
        self.deadline = Some(now + self.timeout());
        self.last_activity = Some(description);
        self.last_activity_at = Some(now);
    }

    /// Switch to the configured timeout. Idempotent; an armed deadline is
    /// recomputed from now.
    pub fn boot_complete(&mut self, now: Instant) {
        if self.phase == TimeoutPhase::Configured {
            return;
        }
        self.phase = TimeoutPhase::Configured;
        if self.armed {
            self.deadline = Some(now + self.timeout());
        }
    }

    /// Produce a dump if the deadline has passed, re-arming for the next
    /// window. Activity that slipped in after the timer elapsed is honoured
    /// because the deadline is re-checked here.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<HangDump> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        let quiet_for = self
            .last_activity_at
            .map(|at| now.duration_since(at))
            .unwrap_or_else(|| self.timeout());
        self.deadline = Some(now + self.timeout());
        Some(HangDump {
            quiet_for,
            phase: self.phase,
            last_activity: self.last_activity.clone(),
            backtrace: Backtrace::force_capture().to_string(),
        })
    }
}

struct WatchdogInner {
    state: Mutex<WatchdogState>,
    notify: Notify,
    stopped: AtomicBool,
}

/// Handle shared by the engine shell and executors.
#[derive(Clone)]
pub struct WatchdogHandle {
    inner: Arc<WatchdogInner>,
}

impl fmt::Debug for WatchdogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchdogHandle").finish_non_exhaustive()
    }
}

impl WatchdogHandle {
    pub fn arm(&self) {
        self.with_state(|state, now| state.arm(now));
        debug!("hang watchdog armed");
    }

    pub fn disarm(&self) {
        self.with_state(|state, _now| state.disarm());
        debug!("hang watchdog disarmed");
    }

    /// Report run activity, pushing the deadline out.
    pub fn ping(&self, activity: Activity, detail: &str) {
        self.with_state(|state, now| state.record_activity(now, format!("{activity}: {detail}")));
    }

    /// Switch from the bootstrap timeout to the configured one.
    pub fn boot_complete(&self) {
        self.with_state(|state, now| state.boot_complete(now));
        info!("boot complete; hang watchdog now uses the configured timeout");
    }

    /// Stop the timer task. Idempotent.
    pub fn shutdown(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Current phase (for tests).
    pub fn phase(&self) -> TimeoutPhase {
        self.lock().phase()
    }

    fn with_state(&self, f: impl FnOnce(&mut WatchdogState, Instant)) {
        let now = Instant::now();
        f(&mut self.lock(), now);
        self.inner.notify.notify_one();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WatchdogState> {
        // The lock only guards deadline arithmetic; the state stays usable
        // even if a panic poisoned it.
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Spawn the watchdog timer task. Must be called from within a Tokio
/// runtime.
pub fn spawn_watchdog(
    bootstrap: Duration,
    configured: Duration,
    events: EventBus,
) -> WatchdogHandle {
    let inner = Arc::new(WatchdogInner {
        state: Mutex::new(WatchdogState::new(bootstrap, configured)),
        notify: Notify::new(),
        stopped: AtomicBool::new(false),
    });
    let handle = WatchdogHandle {
        inner: Arc::clone(&inner),
    };
    tokio::spawn(watchdog_loop(inner, events));
    handle
}

async fn watchdog_loop(inner: Arc<WatchdogInner>, events: EventBus) {
    loop {
        if inner.stopped.load(Ordering::Acquire) {
            break;
        }

        let deadline = {
            match inner.state.lock() {
                Ok(state) => state.deadline(),
                Err(poisoned) => poisoned.into_inner().deadline(),
            }
        };

        match deadline {
            // Disarmed: sleep until some state change wakes us.
            None => inner.notify.notified().await,
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        let dump = {
                            match inner.state.lock() {
                                Ok(mut state) => state.fire_if_due(Instant::now()),
                                Err(poisoned) => poisoned.into_inner().fire_if_due(Instant::now()),
                            }
                        };
                        if let Some(dump) = dump {
                            warn!(
                                quiet_for = ?dump.quiet_for,
                                phase = %dump.phase,
                                last_activity = dump.last_activity.as_deref().unwrap_or("none"),
                                "no test activity within the hang timeout; dumping diagnostics\n{}",
                                dump.backtrace
                            );
                            events.publish(RunEvent::WatchdogFired { dump });
                        }
                    }
                    _ = inner.notify.notified() => {
                        // State changed; recompute the deadline.
                    }
                }
            }
        }
    }
    debug!("watchdog timer task stopped");
}

/// Bootstrap timeout: environment override or the default.
pub fn bootstrap_timeout_from_env() -> Duration {
    match std::env::var(HANG_TIMEOUT_ENV) {
        Ok(raw) => match parse_duration(&raw) {
            Ok(timeout) => {
                debug!(?timeout, "bootstrap hang timeout taken from environment");
                timeout
            }
            Err(err) => {
                warn!(
                    value = %raw,
                    error = %err,
                    "ignoring invalid {HANG_TIMEOUT_ENV}; using default"
                );
                DEFAULT_HANG_TIMEOUT
            }
        },
        Err(_) => DEFAULT_HANG_TIMEOUT,
    }
}
