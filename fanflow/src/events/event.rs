//! Stage lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a stage task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Every input was closed and drained.
    InputExhausted,
    /// The stage's signal fired.
    Cancelled,
    /// Whoever reads the stage's output went away.
    DownstreamClosed,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InputExhausted => "input_exhausted",
            Self::Cancelled => "cancelled",
            Self::DownstreamClosed => "downstream_closed",
        };
        write!(f, "{s}")
    }
}

/// Something that happened to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageEvent {
    /// The stage task began running.
    Started {
        /// Stage name.
        stage: String,
    },
    /// The stage task stopped.
    Exited {
        /// Stage name.
        stage: String,
        /// Why it stopped.
        reason: ExitReason,
        /// How many values it published.
        emitted: u64,
    },
    /// The stage dropped its output sender.
    OutputClosed {
        /// Stage name.
        stage: String,
    },
}

impl StageEvent {
    /// Returns the dotted event type, e.g. `stage.started`.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "stage.started",
            Self::Exited { .. } => "stage.exited",
            Self::OutputClosed { .. } => "stage.output_closed",
        }
    }

    /// Returns the name of the stage the event is about.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::Started { stage } | Self::Exited { stage, .. } | Self::OutputClosed { stage } => {
                stage
            }
        }
    }
}

/// A stage event stamped with the time it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// When the event was recorded.
    pub at: DateTime<Utc>,
    /// The event itself.
    #[serde(flatten)]
    pub event: StageEvent,
}

impl EventRecord {
    /// Stamps `event` with the current time.
    #[must_use]
    pub fn now(event: StageEvent) -> Self {
        Self {
            at: Utc::now(),
            event,
        }
    }
}
