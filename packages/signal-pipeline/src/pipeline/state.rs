//! Run states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Where a run currently is.
///
/// A run visits every state in order, even when a step has nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Collecting,
    Processing,
    Persisting,
    Analyzing,
    Alerting,
}

impl PipelineState {
    /// States a completed run passes through, in order.
    pub const RUN_SEQUENCE: [PipelineState; 5] = [
        PipelineState::Collecting,
        PipelineState::Processing,
        PipelineState::Persisting,
        PipelineState::Analyzing,
        PipelineState::Alerting,
    ];

    /// The state after this one; `Alerting` returns to `Idle`.
    pub fn next(self) -> PipelineState {
        match self {
            PipelineState::Idle => PipelineState::Collecting,
            PipelineState::Collecting => PipelineState::Processing,
            PipelineState::Processing => PipelineState::Persisting,
            PipelineState::Persisting => PipelineState::Analyzing,
            PipelineState::Analyzing => PipelineState::Alerting,
            PipelineState::Alerting => PipelineState::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Collecting => "collecting",
            PipelineState::Processing => "processing",
            PipelineState::Persisting => "persisting",
            PipelineState::Analyzing => "analyzing",
            PipelineState::Alerting => "alerting",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Collecting => 1,
            PipelineState::Processing => 2,
            PipelineState::Persisting => 3,
            PipelineState::Analyzing => 4,
            PipelineState::Alerting => 5,
        }
    }

    fn from_u8(value: u8) -> PipelineState {
        match value {
            1 => PipelineState::Collecting,
            2 => PipelineState::Processing,
            3 => PipelineState::Persisting,
            4 => PipelineState::Analyzing,
            5 => PipelineState::Alerting,
            _ => PipelineState::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding the current state, readable from other tasks.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(PipelineState::Idle.to_u8()))
    }

    pub(crate) fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: PipelineState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }
}
