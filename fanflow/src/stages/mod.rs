//! Pipeline stages.
//!
//! A stage is a task that owns exactly one output channel and borrows zero or
//! more inputs. It stops when its inputs run dry or its signal fires, and it
//! closes its output exactly once on the way out: the output sender is moved
//! into the task and dropped when the task finishes, so no other party can
//! close it.

mod channel;
mod merge;
mod source;
mod transform;

pub use channel::{
    recv_or_cancel, send_or_cancel, FanOutReceiver, RecvOutcome, SendOutcome, OUTPUT_CAPACITY,
};
pub use merge::{merge, MergeGroup, MERGE_STAGE};
pub use source::{generate, SOURCE_STAGE};
pub use transform::{transform, Alphabet, Labeled, Mapper, DEFAULT_LABEL, LATIN_ALPHABET};

use crate::cancellation::{DrainReport, StageSet};
use crate::events::{EventSink, ExitReason, NoOpEventSink, StageEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Where stages spawn their tasks and report their lifecycle.
pub struct StageRuntime {
    tasks: StageSet,
    sink: Arc<dyn EventSink>,
}

impl StageRuntime {
    /// Creates a runtime reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            tasks: StageSet::new(),
            sink,
        }
    }

    /// Returns the event sink.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn EventSink> {
        self.sink.clone()
    }

    /// Returns the set of spawned tasks.
    #[must_use]
    pub const fn tasks(&self) -> &StageSet {
        &self.tasks
    }

    /// Spawns a named stage task.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(name, task);
    }

    /// Waits up to `grace` for every spawned stage to exit.
    pub async fn drain(&self, grace: Duration) -> DrainReport {
        self.tasks.drain(grace).await
    }
}

impl Default for StageRuntime {
    fn default() -> Self {
        Self::new(Arc::new(NoOpEventSink))
    }
}

impl std::fmt::Debug for StageRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRuntime")
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

/// Lifecycle bookkeeping for one running stage task.
struct StageLife {
    name: String,
    sink: Arc<dyn EventSink>,
    emitted: u64,
}

impl StageLife {
    fn start(name: impl Into<String>, sink: Arc<dyn EventSink>) -> Self {
        let name = name.into();
        debug!(stage = %name, "Stage started");
        sink.emit(StageEvent::Started {
            stage: name.clone(),
        });
        Self {
            name,
            sink,
            emitted: 0,
        }
    }

    fn record_emit(&mut self) {
        self.emitted += 1;
    }

    /// Reports the exit without touching any output.
    fn exit(self, reason: ExitReason) {
        debug!(stage = %self.name, %reason, emitted = self.emitted, "Stage exited");
        self.sink.emit(StageEvent::Exited {
            stage: self.name,
            reason,
            emitted: self.emitted,
        });
    }

    /// Reports the exit and closes the stage's output.
    fn finish<T>(self, reason: ExitReason, output: mpsc::Sender<T>) {
        let name = self.name.clone();
        let sink = self.sink.clone();
        self.exit(reason);
        drop(output);
        sink.emit(StageEvent::OutputClosed { stage: name });
    }
}
