//! Driver state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a pipeline run is in its lifecycle.
///
/// `Idle -> Running -> {Matched | TimedOut | Exhausted} -> Cancelling -> Drained`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started.
    #[default]
    Idle,
    /// Stages are running and the driver is reading merged output.
    Running,
    /// The predicate matched a value.
    Matched,
    /// The overall deadline elapsed first.
    TimedOut,
    /// The merged output closed before a match or the deadline.
    Exhausted,
    /// The root signal has been triggered; stages are shutting down.
    Cancelling,
    /// Every stage has exited or the grace period ran out.
    Drained,
}

impl PipelineState {
    /// Returns true if moving from `self` to `next` is a legal step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Matched | Self::TimedOut | Self::Exhausted)
                | (Self::Matched | Self::TimedOut | Self::Exhausted, Self::Cancelling)
                | (Self::Cancelling, Self::Drained)
        )
    }

    /// Returns true for the three ways a run can stop reading.
    #[must_use]
    pub const fn is_outcome(self) -> bool {
        matches!(self, Self::Matched | Self::TimedOut | Self::Exhausted)
    }

    /// Returns true once nothing more will happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Drained)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Matched => write!(f, "matched"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Drained => write!(f, "drained"),
        }
    }
}
