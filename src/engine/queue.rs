// src/engine/queue.rs

//! Rerun latch: what happens to triggers that arrive while a run is active.
//!
//! Any number of triggers arriving mid-run collapse into at most one pending
//! rerun. Only the latest trigger source is kept; the count of collapsed
//! triggers is tracked for logging and tests.

use tracing::debug;

use super::TriggerSource;

#[derive(Debug, Default)]
pub struct RerunLatch {
    pending: Option<TriggerSource>,
    coalesced: u32,
}

impl RerunLatch {
    pub fn new() -> Self {
        RerunLatch::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    /// Number of triggers folded into the currently pending rerun.
    pub fn coalesced(&self) -> u32 {
        self.coalesced
    }

    /// Record a trigger for a future rerun, replacing any earlier one.
    pub fn record(&mut self, trigger: TriggerSource) {
        self.coalesced += 1;
        let replaced = self.pending.replace(trigger);
        debug!(
            %trigger,
            ?replaced,
            coalesced = self.coalesced,
            "trigger latched for rerun"
        );
    }

    /// Consume the pending rerun, if any.
    pub fn take(&mut self) -> Option<TriggerSource> {
        self.coalesced = 0;
        self.pending.take()
    }

    /// Drop the pending rerun without running it.
    pub fn clear(&mut self) {
        if self.pending.take().is_some() {
            debug!(
                coalesced = self.coalesced,
                "pending rerun cleared without running"
            );
        }
        self.coalesced = 0;
    }
}
