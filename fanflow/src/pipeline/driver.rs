//! The pipeline driver: wires source, branches and merge, then reads until done.

use super::{Outcome, PipelineConfig, PipelineSettings, PipelineState};
use crate::cancellation::{CancelReason, CancellationSignal};
use crate::context::{RunIdentity, BRANCH_LABEL, RUN_ID};
use crate::errors::Result;
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::{generate, merge, transform, FanOutReceiver, Labeled, Mapper, StageRuntime};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runs one pipeline to completion.
///
/// Returns an error only for invalid settings. Every other ending, including
/// the overall deadline, is an [`Outcome`].
pub async fn run_pipeline<M, O, P>(config: PipelineConfig<M, P>) -> Result<Outcome<Labeled<O>>>
where
    M: Mapper<usize, O>,
    O: fmt::Debug + Send + 'static,
    P: FnMut(&Labeled<O>) -> bool + Send,
{
    run_pipeline_with_sink(config, Arc::new(NoOpEventSink)).await
}

/// Runs one pipeline, reporting stage lifecycle events to `sink`.
pub async fn run_pipeline_with_sink<M, O, P>(
    config: PipelineConfig<M, P>,
    sink: Arc<dyn EventSink>,
) -> Result<Outcome<Labeled<O>>>
where
    M: Mapper<usize, O>,
    O: fmt::Debug + Send + 'static,
    P: FnMut(&Labeled<O>) -> bool + Send,
{
    let PipelineConfig {
        settings,
        mapper,
        predicate,
    } = config;
    settings.validate()?;

    let identity = RunIdentity::new();
    let span = info_span!("pipeline", run_id = %identity.run_id);
    let driver = Driver {
        settings,
        identity,
        state: PipelineState::Idle,
    };
    Ok(driver.run(mapper, predicate, sink).instrument(span).await)
}

/// Why the driver stopped reading.
enum Stop<T> {
    Matched(T),
    TimedOut,
    Exhausted,
}

impl<T> Stop<T> {
    const fn state(&self) -> PipelineState {
        match self {
            Self::Matched(_) => PipelineState::Matched,
            Self::TimedOut => PipelineState::TimedOut,
            Self::Exhausted => PipelineState::Exhausted,
        }
    }
}

struct Driver {
    settings: PipelineSettings,
    identity: RunIdentity,
    state: PipelineState,
}

impl Driver {
    fn advance(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected pipeline state transition");
        }
        debug!(from = %self.state, to = %next, "Pipeline state changed");
        self.state = next;
    }

    async fn run<M, O, P>(
        mut self,
        mapper: Arc<M>,
        predicate: P,
        sink: Arc<dyn EventSink>,
    ) -> Outcome<Labeled<O>>
    where
        M: Mapper<usize, O>,
        O: fmt::Debug + Send + 'static,
        P: FnMut(&Labeled<O>) -> bool + Send,
    {
        let rt = StageRuntime::new(sink);
        let root = CancellationSignal::with_timeout(self.settings.overall_deadline())
            .with_value(&RUN_ID, self.identity.run_id);
        // Stages must hear about it even if this future is dropped mid-run.
        let _guard = root.trigger_on_drop("pipeline dropped");
        let started = Instant::now();

        self.advance(PipelineState::Running);
        info!(
            branches = self.settings.branch_count,
            deadline_ms = self.settings.overall_deadline_ms,
            started_at = %self.identity.started_at,
            "Pipeline started"
        );

        let mut merged = self.wire(&rt, &root, &mapper);
        let stop = self.consume(&mut merged, &root, predicate).await;
        let elapsed = started.elapsed();

        self.advance(stop.state());
        self.advance(PipelineState::Cancelling);
        root.trigger(match &stop {
            Stop::TimedOut => CancelReason::DeadlineExceeded,
            Stop::Matched(_) => CancelReason::requested("predicate matched"),
            Stop::Exhausted => CancelReason::requested("merged output exhausted"),
        });
        drop(merged);

        let drain = rt.drain(self.settings.grace_period()).await;
        if !drain.leaked.is_empty() {
            warn!(leaked = ?drain.leaked, "Stages outlived the grace period");
        }
        self.advance(PipelineState::Drained);

        let outcome = match stop {
            Stop::Matched(value) => Outcome::Matched {
                value,
                elapsed,
                drain,
            },
            Stop::TimedOut => Outcome::TimedOut { elapsed, drain },
            Stop::Exhausted => Outcome::Exhausted { elapsed, drain },
        };
        info!(
            outcome = outcome.kind(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            stages = outcome.drain().total(),
            "Pipeline finished"
        );
        outcome
    }

    /// Starts every stage and returns the merged output.
    fn wire<M, O>(
        &self,
        rt: &StageRuntime,
        root: &CancellationSignal,
        mapper: &Arc<M>,
    ) -> mpsc::Receiver<Labeled<O>>
    where
        M: Mapper<usize, O>,
        O: Send + 'static,
    {
        let source = FanOutReceiver::new(generate(rt, root, self.settings.modulus));
        let per_branch = self.settings.per_branch_deadline();

        let branches: Vec<_> = self
            .settings
            .labels()
            .into_iter()
            .map(|label| {
                let signal = per_branch
                    .map_or_else(|| root.clone(), |d| root.child_with_deadline(d))
                    .with_value(&BRANCH_LABEL, label);
                transform(rt, &signal, source.clone(), mapper.clone())
            })
            .collect();

        // Only the branches may hold the source output from here on.
        drop(source);
        merge(rt, root, branches)
    }

    async fn consume<O, P>(
        &self,
        merged: &mut mpsc::Receiver<Labeled<O>>,
        root: &CancellationSignal,
        mut predicate: P,
    ) -> Stop<Labeled<O>>
    where
        O: fmt::Debug,
        P: FnMut(&Labeled<O>) -> bool,
    {
        let delay = self.settings.consume_delay();

        loop {
            tokio::select! {
                biased;
                () = root.cancelled() => return Stop::TimedOut,
                next = merged.recv() => match next {
                    Some(value) if predicate(&value) => {
                        debug!(?value, "Predicate matched");
                        return Stop::Matched(value);
                    }
                    Some(value) => {
                        debug!(?value, "Value consumed");
                        if !delay.is_zero() && !pause(root, delay).await {
                            return Stop::TimedOut;
                        }
                    }
                    None => return Stop::Exhausted,
                },
            }
        }
    }
}

/// Sleeps for `delay` unless the signal fires first. Returns false if it fired.
async fn pause(signal: &CancellationSignal, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = signal.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
