//! Result of a pipeline run.

use crate::cancellation::DrainReport;
use std::time::Duration;

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The predicate matched `value` after `elapsed`.
    Matched {
        /// The matching value.
        value: T,
        /// Time from start until the match was observed.
        elapsed: Duration,
        /// Shutdown report.
        drain: DrainReport,
    },
    /// The overall deadline elapsed before a match.
    TimedOut {
        /// Time from start until the deadline was observed.
        elapsed: Duration,
        /// Shutdown report.
        drain: DrainReport,
    },
    /// The merged output closed before a match or the overall deadline.
    Exhausted {
        /// Time from start until the output closed.
        elapsed: Duration,
        /// Shutdown report.
        drain: DrainReport,
    },
}

impl<T> Outcome<T> {
    /// Time from start until the run stopped reading.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Matched { elapsed, .. }
            | Self::TimedOut { elapsed, .. }
            | Self::Exhausted { elapsed, .. } => *elapsed,
        }
    }

    /// Shutdown report.
    #[must_use]
    pub const fn drain(&self) -> &DrainReport {
        match self {
            Self::Matched { drain, .. }
            | Self::TimedOut { drain, .. }
            | Self::Exhausted { drain, .. } => drain,
        }
    }

    /// Returns true for [`Outcome::Matched`].
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// Returns true for [`Outcome::TimedOut`].
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Returns the matching value, if any.
    #[must_use]
    pub const fn matched_value(&self) -> Option<&T> {
        match self {
            Self::Matched { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Consumes the outcome, returning the matching value.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Matched { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Short name of the variant, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Matched { .. } => "matched",
            Self::TimedOut { .. } => "timed_out",
            Self::Exhausted { .. } => "exhausted",
        }
    }
}
