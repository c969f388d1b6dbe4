//! The merge stage: fan-in of several inputs onto one output.

use super::{
    recv_or_cancel, send_or_cancel, RecvOutcome, SendOutcome, StageLife, StageRuntime,
    OUTPUT_CAPACITY,
};
use crate::cancellation::CancellationSignal;
use crate::events::{EventSink, ExitReason};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Stage name the merge completion watcher reports under.
pub const MERGE_STAGE: &str = "merge";

/// Counts the relays of one merge that are still running.
///
/// The shared output is closed only after the count reaches zero, and the
/// count reaches zero exactly once.
#[derive(Debug)]
pub struct MergeGroup {
    active: AtomicUsize,
    relayed: AtomicU64,
    idle: Notify,
}

impl MergeGroup {
    /// Creates a group expecting `relays` relays.
    #[must_use]
    pub fn new(relays: usize) -> Self {
        Self {
            active: AtomicUsize::new(relays),
            relayed: AtomicU64::new(0),
            idle: Notify::new(),
        }
    }

    /// Number of relays still running.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Number of values republished so far.
    #[must_use]
    pub fn relayed(&self) -> u64 {
        self.relayed.load(Ordering::Relaxed)
    }

    fn record_relayed(&self) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks one relay as finished. Returns true for the last one.
    ///
    /// The count never goes below zero; extra calls return false.
    fn finish(&self) -> bool {
        let last = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            == Ok(1);
        if last {
            self.idle.notify_one();
        }
        last
    }

    /// Completes once every relay has finished.
    pub async fn wait_idle(&self) {
        while self.active() != 0 {
            self.idle.notified().await;
        }
    }
}

/// Finishes its relay in the group when dropped, so an aborted relay still counts.
struct RelayGuard(Arc<MergeGroup>);

impl Drop for RelayGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Starts a merge over `inputs`.
///
/// One relay per input copies values onto the shared output, preserving the
/// order within each input; interleaving across inputs is arbitrary. A
/// separate watcher closes the output once every relay has stopped, either
/// because its input ran dry or because the signal fired. Values a relay has
/// taken but not yet republished when the signal fires are dropped.
pub fn merge<T, I>(rt: &StageRuntime, signal: &CancellationSignal, inputs: I) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = mpsc::Receiver<T>>,
{
    let inputs: Vec<_> = inputs.into_iter().collect();
    let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
    let group = Arc::new(MergeGroup::new(inputs.len()));

    for (index, input) in inputs.into_iter().enumerate() {
        let name = format!("{MERGE_STAGE}.relay[{index}]");
        rt.spawn(
            name.clone(),
            relay(
                name,
                input,
                tx.clone(),
                signal.clone(),
                RelayGuard(group.clone()),
                rt.sink(),
            ),
        );
    }

    let signal = signal.clone();
    let sink = rt.sink();
    rt.spawn(MERGE_STAGE, async move {
        let mut life = StageLife::start(MERGE_STAGE, sink);
        group.wait_idle().await;
        life.emitted = group.relayed();

        let reason = if signal.is_triggered() {
            ExitReason::Cancelled
        } else {
            ExitReason::InputExhausted
        };
        life.finish(reason, tx);
    });

    rx
}

async fn relay<T>(
    name: String,
    mut input: mpsc::Receiver<T>,
    output: mpsc::Sender<T>,
    signal: CancellationSignal,
    guard: RelayGuard,
    sink: Arc<dyn EventSink>,
) {
    let mut life = StageLife::start(name, sink);

    let reason = loop {
        let value = match recv_or_cancel(&mut input, &signal).await {
            RecvOutcome::Item(value) => value,
            RecvOutcome::Exhausted => break ExitReason::InputExhausted,
            RecvOutcome::Cancelled => break ExitReason::Cancelled,
        };

        match send_or_cancel(&output, value, &signal).await {
            SendOutcome::Delivered => {
                life.record_emit();
                guard.0.record_relayed();
            }
            SendOutcome::Cancelled => break ExitReason::Cancelled,
            SendOutcome::Disconnected => break ExitReason::DownstreamClosed,
        }
    };

    // The shared sender must be gone before the group can reach zero.
    drop(output);
    life.exit(reason);
    drop(guard);
}
