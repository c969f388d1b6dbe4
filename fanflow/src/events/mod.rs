//! Stage lifecycle events.
//!
//! Every stage reports when it starts, when it exits and why, and when it
//! closes its output. Sinks decide what to do with those reports.

mod event;
mod sink;

pub use event::{EventRecord, ExitReason, StageEvent};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
