//! Channel operations raced against a cancellation signal.

use crate::cancellation::CancellationSignal;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

/// Capacity of every stage output. One slot, the only buffering policy.
pub const OUTPUT_CAPACITY: usize = 1;

/// Result of trying to publish one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The value is in the channel.
    Delivered,
    /// The signal fired first. The value was dropped.
    Cancelled,
    /// The receiving side is gone. The value was dropped.
    Disconnected,
}

/// Result of waiting for one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome<T> {
    /// A value arrived.
    Item(T),
    /// The channel is closed and empty.
    Exhausted,
    /// The signal fired first.
    Cancelled,
}

/// Publishes `value` unless the signal fires first.
///
/// Sends immediately when the slot is free; otherwise waits for whichever
/// comes first, the consumer taking the value or the signal firing. Nothing is
/// published once the signal has fired.
pub async fn send_or_cancel<T>(
    tx: &mpsc::Sender<T>,
    value: T,
    signal: &CancellationSignal,
) -> SendOutcome {
    if signal.is_triggered() {
        return SendOutcome::Cancelled;
    }

    match tx.try_send(value) {
        Ok(()) => SendOutcome::Delivered,
        Err(TrySendError::Closed(_)) => SendOutcome::Disconnected,
        Err(TrySendError::Full(value)) => {
            tokio::select! {
                biased;
                () = signal.cancelled() => SendOutcome::Cancelled,
                sent = tx.send(value) => match sent {
                    Ok(()) => SendOutcome::Delivered,
                    Err(_) => SendOutcome::Disconnected,
                },
            }
        }
    }
}

/// Waits for the next value unless the signal fires first.
pub async fn recv_or_cancel<T>(
    rx: &mut mpsc::Receiver<T>,
    signal: &CancellationSignal,
) -> RecvOutcome<T> {
    tokio::select! {
        biased;
        () = signal.cancelled() => RecvOutcome::Cancelled,
        item = rx.recv() => item.map_or(RecvOutcome::Exhausted, RecvOutcome::Item),
    }
}

/// A receiver several consumers can read from at once.
///
/// Each value goes to exactly one clone: consumers race for work, nothing is
/// broadcast. The channel closes for everyone when the producer drops its
/// sender.
#[derive(Debug)]
pub struct FanOutReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> FanOutReceiver<T> {
    /// Wraps a receiver for shared consumption.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Waits for the next value unless the signal fires first.
    pub async fn recv_or_cancel(&self, signal: &CancellationSignal) -> RecvOutcome<T> {
        tokio::select! {
            biased;
            () = signal.cancelled() => RecvOutcome::Cancelled,
            item = async { self.inner.lock().await.recv().await } => {
                item.map_or(RecvOutcome::Exhausted, RecvOutcome::Item)
            }
        }
    }

    /// Returns the number of consumers sharing this receiver.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for FanOutReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> From<mpsc::Receiver<T>> for FanOutReceiver<T> {
    fn from(rx: mpsc::Receiver<T>) -> Self {
        Self::new(rx)
    }
}
