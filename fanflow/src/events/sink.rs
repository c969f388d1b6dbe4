//! Event sink trait and implementations.

use super::{EventRecord, ExitReason, StageEvent};
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Receives stage lifecycle events.
///
/// Sinks are called from inside stage tasks, so `emit` must not block.
pub trait EventSink: Send + Sync {
    /// Records an event. Must never panic or block.
    fn emit(&self, event: StageEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: StageEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub const fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: StageEvent) {
        let event_type = event.event_type();
        if self.level == Level::INFO {
            info!(event_type, stage = event.stage(), event = ?event, "Event: {}", event_type);
        } else {
            debug!(event_type, stage = event.stage(), event = ?event, "Event: {}", event_type);
        }
    }
}

/// A collecting event sink for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<EventRecord>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.read().iter().map(|r| r.event.clone()).collect()
    }

    /// Returns all collected records, timestamps included.
    #[must_use]
    pub fn records(&self) -> Vec<EventRecord> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<StageEvent> {
        self.events
            .read()
            .iter()
            .filter(|r| r.event.event_type().starts_with(type_prefix))
            .map(|r| r.event.clone())
            .collect()
    }

    /// Returns the events about one stage.
    #[must_use]
    pub fn events_for(&self, stage: &str) -> Vec<StageEvent> {
        self.events
            .read()
            .iter()
            .filter(|r| r.event.stage() == stage)
            .map(|r| r.event.clone())
            .collect()
    }

    /// Counts how many times `stage` reported closing its output.
    #[must_use]
    pub fn closed_count(&self, stage: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|r| matches!(&r.event, StageEvent::OutputClosed { stage: s } if s == stage))
            .count()
    }

    /// Returns the exit reason `stage` reported, if it exited.
    #[must_use]
    pub fn exit_reason(&self, stage: &str) -> Option<ExitReason> {
        self.events.read().iter().find_map(|r| match &r.event {
            StageEvent::Exited { stage: s, reason, .. } if s == stage => Some(*reason),
            _ => None,
        })
    }

    /// Returns the names of stages that started, in start order.
    #[must_use]
    pub fn started_stages(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter_map(|r| match &r.event {
                StageEvent::Started { stage } => Some(stage.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: StageEvent) {
        self.events.write().push(EventRecord::now(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn started(stage: &str) -> StageEvent {
        StageEvent::Started {
            stage: stage.to_string(),
        }
    }

    fn closed(stage: &str) -> StageEvent {
        StageEvent::OutputClosed {
            stage: stage.to_string(),
        }
    }

    #[test]
    fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(started("source"));
        // Should not panic
    }

    #[test]
    fn test_logging_sink() {
        LoggingEventSink::default().emit(started("source"));
        LoggingEventSink::info().emit(closed("source"));
        // Should not panic
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(started("source"));
        sink.emit(closed("source"));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events(), vec![started("source"), closed("source")]);
        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn test_collecting_sink_queries() {
        let sink = CollectingEventSink::new();
        sink.emit(started("source"));
        sink.emit(started("transform:w1"));
        sink.emit(StageEvent::Exited {
            stage: "source".to_string(),
            reason: ExitReason::Cancelled,
            emitted: 10,
        });
        sink.emit(closed("source"));

        assert_eq!(sink.events_of_type("stage.started").len(), 2);
        assert_eq!(sink.events_for("source").len(), 3);
        assert_eq!(sink.closed_count("source"), 1);
        assert_eq!(sink.closed_count("transform:w1"), 0);
        assert_eq!(sink.exit_reason("source"), Some(ExitReason::Cancelled));
        assert_eq!(sink.exit_reason("transform:w1"), None);
        assert_eq!(
            sink.started_stages(),
            vec!["source".to_string(), "transform:w1".to_string()]
        );
    }

    #[test]
    fn test_collecting_sink_clear() {
        let sink = CollectingEventSink::new();
        sink.emit(started("source"));
        assert_eq!(sink.len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
