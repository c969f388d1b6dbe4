//! Tracking for the tasks that make up a running pipeline.

use super::token::deadline_after;
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What happened to the tracked tasks during a drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that exited on their own within the grace period.
    pub completed: usize,
    /// Tasks that panicked.
    pub panicked: Vec<String>,
    /// Tasks still running when the grace period ran out. They were aborted.
    pub leaked: Vec<String>,
}

impl DrainReport {
    /// Returns true if every task exited cleanly within the grace period.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.panicked.is_empty() && self.leaked.is_empty()
    }

    /// Total number of tasks the drain looked at.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.panicked.len() + self.leaked.len()
    }
}

/// A named set of spawned stage tasks.
///
/// Stages register every task they spawn here so the driver can wait for all
/// of them after cancellation.
#[derive(Default)]
pub struct StageSet {
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl StageSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a named task and tracks it.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!(task = %name, "Spawning stage task");
        let handle = tokio::spawn(task);
        self.handles.lock().push((name, handle));
    }

    /// Returns the number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Returns the number of tracked tasks that have not finished yet.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Waits up to `grace` for every tracked task to exit.
    ///
    /// Tasks still running afterwards are aborted and reported as leaked. The
    /// set is empty once this returns.
    pub async fn drain(&self, grace: Duration) -> DrainReport {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        let deadline = deadline_after(grace);
        let mut report = DrainReport::default();

        for (name, mut handle) in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.completed += 1,
                Ok(Err(join_error)) => {
                    warn!(task = %name, "Stage task failed: {}", join_error);
                    report.panicked.push(name);
                }
                Err(_) => {
                    warn!(task = %name, "Stage task outlived the grace period, aborting");
                    handle.abort();
                    report.leaked.push(name);
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for StageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSet")
            .field("task_count", &self.len())
            .field("live_count", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationSignal;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_drain_all_complete() {
        let set = StageSet::new();
        set.spawn("a", async {});
        set.spawn("b", async {});
        assert_eq!(set.len(), 2);

        let report = set.drain(Duration::from_secs(1)).await;

        assert_eq!(report.completed, 2);
        assert!(report.is_clean());
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_drain_reports_panics() {
        let set = StageSet::new();
        set.spawn("ok", async {});
        set.spawn("boom", async {
            panic!("Intentional");
        });

        let report = set.drain(Duration::from_secs(1)).await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.panicked, vec!["boom".to_string()]);
        assert!(!report.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_aborts_stragglers() {
        let set = StageSet::new();
        set.spawn("stubborn", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let report = set.drain(Duration::from_millis(50)).await;

        assert_eq!(report.leaked, vec!["stubborn".to_string()]);
        assert_eq!(report.total(), 1);
    }

    #[tokio::test]
    async fn test_drain_with_unbounded_grace() {
        let set = StageSet::new();
        set.spawn("quick", async {});

        let report = set.drain(Duration::MAX).await;

        assert_eq!(report.completed, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_tasks_observing_signal_drain_cleanly() {
        let set = StageSet::new();
        let signal = CancellationSignal::new();

        for i in 0..4 {
            let signal = signal.clone();
            set.spawn(format!("waiter-{i}"), async move { signal.cancelled().await });
        }
        assert_eq!(set.live_count(), 4);

        signal.cancel("shutdown");
        let report = set.drain(Duration::from_secs(1)).await;

        assert_eq!(report.completed, 4);
        assert!(report.is_clean());
    }
}
