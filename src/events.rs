// src/events.rs

//! Run event stream and result aggregation.
//!
//! Every observable moment of a test run is published on an [`EventBus`]
//! (tokio broadcast under the hood). Events carry a monotonically increasing
//! sequence number so consumers can detect gaps after lagging.
//!
//! Publishing never blocks and never fails: a bus with no subscribers just
//! drops events.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::engine::TriggerSource;
use crate::types::RunMode;
use crate::watchdog::HangDump;

/// Outcome of one test class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestVerdict {
    Passed,
    Failed,
    /// The test process could not be run at all.
    Errored,
}

impl TestVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestVerdict::Passed)
    }
}

impl fmt::Display for TestVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestVerdict::Passed => write!(f, "passed"),
            TestVerdict::Failed => write!(f, "failed"),
            TestVerdict::Errored => write!(f, "errored"),
        }
    }
}

/// Result of one executed test class.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub class_name: String,
    pub verdict: TestVerdict,
    pub duration: Duration,
    /// Captured process output; kept only for non-passing tests unless
    /// output display is on.
    pub output: Option<String>,
}

/// A test that was part of the candidate set but never executed.
#[derive(Debug, Clone)]
pub struct SkippedTest {
    pub class_name: String,
    pub reason: String,
}

/// Aggregated result of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: u64,
    pub trigger: TriggerSource,
    pub outcomes: Vec<TestOutcome>,
    pub skipped: Vec<SkippedTest>,
    pub duration: Duration,
    /// The run was interrupted at a test boundary before finishing.
    pub aborted: bool,
    /// Set when the packaged artifact failed to come up for the framework
    /// phase.
    pub launch_failure: Option<String>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.count(TestVerdict::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(TestVerdict::Failed)
    }

    pub fn errored(&self) -> usize {
        self.count(TestVerdict::Errored)
    }

    pub fn executed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_success(&self) -> bool {
        !self.aborted && self.launch_failure.is_none() && self.passed() == self.executed()
    }

    fn count(&self, verdict: TestVerdict) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.verdict == verdict)
            .count()
    }
}

/// Observable engine and run events.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: u64,
        trigger: TriggerSource,
        selected: usize,
    },
    TestStarted {
        run_id: u64,
        class_name: String,
    },
    TestFinished {
        run_id: u64,
        class_name: String,
        verdict: TestVerdict,
        duration: Duration,
    },
    RunFinished {
        summary: RunSummary,
    },
    /// The hang watchdog saw no test activity for the whole timeout window.
    WatchdogFired {
        dump: HangDump,
    },
    ModeChanged {
        mode: RunMode,
    },
    /// The engine hit an internal inconsistency and disabled itself.
    EngineFault {
        message: String,
    },
}

/// An event plus its position in the stream.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub seq: u64,
    pub event: RunEvent,
}

/// Fan-out bus for [`RunEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
    seq: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        EventBus {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Publish an event; returns its sequence number.
    pub fn publish(&self, event: RunEvent) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        // Send only errors when there are no subscribers, which is fine.
        let _ = self.tx.send(EventEnvelope { seq, event });
        seq
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(256)
    }
}
