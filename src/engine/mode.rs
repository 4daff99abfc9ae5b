// src/engine/mode.rs

//! Run-mode state machine.
//!
//! Three modes, one rule with teeth: `disabled` is final. Every transition
//! between `paused` and `enabled` (in either direction, including no-op
//! self-transitions) is allowed, as is entering `disabled` from anywhere.
//! Once disabled, every further request is rejected for the rest of the
//! session.

use tracing::debug;

use crate::errors::{Result, TestwatchError};
use crate::types::RunMode;

use super::TriggerSource;

/// An accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub from: RunMode,
    pub to: RunMode,
}

impl ModeChange {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug)]
pub struct ModeMachine {
    mode: RunMode,
}

impl ModeMachine {
    pub fn new(initial: RunMode) -> Self {
        ModeMachine { mode: initial }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Apply a requested transition.
    ///
    /// Rejects everything once the machine is disabled, including
    /// `disabled -> disabled`.
    pub fn request(&mut self, to: RunMode) -> Result<ModeChange> {
        if self.mode == RunMode::Disabled {
            return Err(TestwatchError::IllegalTransition {
                from: self.mode,
                to,
            });
        }
        let from = self.mode;
        self.mode = to;
        debug!(%from, %to, "mode transition accepted");
        Ok(ModeChange { from, to })
    }

    /// Engine-internal disable used for fatal faults. Unlike [`request`],
    /// this always succeeds; returns whether the mode actually changed.
    ///
    /// [`request`]: ModeMachine::request
    pub fn force_disable(&mut self) -> bool {
        let changed = self.mode != RunMode::Disabled;
        self.mode = RunMode::Disabled;
        changed
    }

    /// Whether a run triggered by `trigger` may start right now.
    pub fn permits(&self, trigger: TriggerSource) -> bool {
        match self.mode {
            RunMode::Disabled => false,
            RunMode::Enabled => true,
            RunMode::Paused => !trigger.is_automatic(),
        }
    }
}
