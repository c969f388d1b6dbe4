//! Structured cancellation for pipeline stages.
//!
//! This module provides:
//! - CancellationSignal, a tree of broadcast-once stop notifications with deadlines
//! - TriggerGuard for firing a signal when a scope exits
//! - StageSet for waiting on every spawned stage after cancellation

mod guard;
mod task_group;
mod token;

pub use guard::TriggerGuard;
pub use task_group::{DrainReport, StageSet};
pub use token::{CancelReason, CancellationSignal, TriggerCallback};
