//! Drop guard that fires a signal.

use super::{CancelReason, CancellationSignal};

/// Fires its signal when dropped, unless disarmed.
///
/// Holding one of these in the driver guarantees every stage is told to stop
/// even when the driver future itself is dropped mid-run.
#[must_use = "the signal fires as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TriggerGuard {
    signal: Option<CancellationSignal>,
    reason: CancelReason,
}

impl TriggerGuard {
    /// Creates a guard for `signal`.
    pub fn new(signal: CancellationSignal, reason: CancelReason) -> Self {
        Self {
            signal: Some(signal),
            reason,
        }
    }

    /// Disarms the guard, leaving the signal untouched on drop.
    pub fn disarm(&mut self) {
        self.signal = None;
    }
}

impl Drop for TriggerGuard {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.trigger(self.reason.clone());
        }
    }
}

impl CancellationSignal {
    /// Returns a guard that fires this signal when dropped.
    pub fn trigger_on_drop(&self, message: impl Into<String>) -> TriggerGuard {
        TriggerGuard::new(self.clone(), CancelReason::requested(message))
    }
}
