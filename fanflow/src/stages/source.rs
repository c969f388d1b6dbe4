//! The source stage: an endless sequence of indices.

use super::{send_or_cancel, SendOutcome, StageLife, StageRuntime, OUTPUT_CAPACITY};
use crate::cancellation::CancellationSignal;
use crate::events::ExitReason;
use tokio::sync::mpsc;

/// Stage name the source reports under.
pub const SOURCE_STAGE: &str = "source";

/// Starts the source stage.
///
/// Emits `i % modulus` for `i = 0, 1, 2, ...` until the signal fires or every
/// receiver is gone. A `modulus` of zero is treated as one.
pub fn generate(
    rt: &StageRuntime,
    signal: &CancellationSignal,
    modulus: usize,
) -> mpsc::Receiver<usize> {
    let modulus = modulus.max(1);
    let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
    let signal = signal.clone();
    let sink = rt.sink();

    rt.spawn(SOURCE_STAGE, async move {
        let mut life = StageLife::start(SOURCE_STAGE, sink);
        let mut index: usize = 0;

        let reason = loop {
            match send_or_cancel(&tx, index % modulus, &signal).await {
                SendOutcome::Delivered => {
                    life.record_emit();
                    index = index.wrapping_add(1);
                }
                SendOutcome::Cancelled => break ExitReason::Cancelled,
                SendOutcome::Disconnected => break ExitReason::DownstreamClosed,
            }
        };

        life.finish(reason, tx);
    });

    rx
}
