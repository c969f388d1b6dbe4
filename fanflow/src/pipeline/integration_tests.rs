//! End-to-end tests for pipeline runs.

use crate::errors::FanflowError;
use crate::events::{CollectingEventSink, ExitReason, StageEvent};
use crate::pipeline::{run_pipeline, run_pipeline_with_sink, Outcome, PipelineConfig};
use crate::stages::{Alphabet, Labeled, MERGE_STAGE, SOURCE_STAGE};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn never(_: &Labeled<char>) -> bool {
    false
}

/// Every stage that owns an output must have closed it exactly once.
fn assert_outputs_closed_once(sink: &CollectingEventSink) {
    let owners: Vec<String> = sink
        .started_stages()
        .into_iter()
        .filter(|stage| !stage.starts_with("merge.relay"))
        .collect();
    assert!(!owners.is_empty());
    for stage in owners {
        assert_eq!(sink.closed_count(&stage), 1, "{stage}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_predicate_match_stops_every_branch() {
    let sink = Arc::new(CollectingEventSink::new());
    let config = PipelineConfig::new(Alphabet::latin(), |v: &Labeled<char>| {
        v.to_string() == "w1: z"
    })
    .with_branch_labels(["w1", "w2"])
    .with_overall_deadline(Duration::from_secs(10));

    let outcome = run_pipeline_with_sink(config, sink.clone()).await.unwrap();

    assert!(outcome.is_matched());
    assert_eq!(outcome.matched_value(), Some(&Labeled::new("w1", 'z')));
    assert!(outcome.elapsed() < Duration::from_secs(10));

    // source, two transforms, two relays, the merge watcher
    let drain = outcome.drain();
    assert!(drain.is_clean(), "{drain:?}");
    assert_eq!(drain.completed, 6);

    assert_outputs_closed_once(&sink);
    assert_eq!(sink.exit_reason(SOURCE_STAGE), Some(ExitReason::Cancelled));
    assert_eq!(sink.exit_reason("transform:w1"), Some(ExitReason::Cancelled));
    assert_eq!(sink.exit_reason("transform:w2"), Some(ExitReason::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_race_times_out() {
    // The consumer needs 100ms per value, far past the deadline.
    let config = PipelineConfig::new(Alphabet::latin(), |v: &Labeled<char>| v.value == 'z')
        .with_overall_deadline(Duration::from_millis(50))
        .with_consume_delay(Duration::from_millis(100));

    let outcome = run_pipeline(config).await.unwrap();

    assert!(outcome.is_timed_out());
    assert!(outcome.elapsed() >= Duration::from_millis(50));
    assert!(outcome.elapsed() < Duration::from_millis(60));
    assert!(outcome.drain().is_clean());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_race_with_busy_stages() {
    let sink = Arc::new(CollectingEventSink::new());
    let config = PipelineConfig::new(Alphabet::latin(), never)
        .with_branch_count(3)
        .with_overall_deadline(Duration::from_millis(50));

    let outcome = run_pipeline_with_sink(config, sink.clone()).await.unwrap();

    assert!(outcome.is_timed_out());
    assert!(outcome.elapsed() >= Duration::from_millis(50));
    assert!(outcome.elapsed() < Duration::from_millis(500));
    assert!(outcome.drain().is_clean());
    assert_outputs_closed_once(&sink);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_branch_deadlines_exhaust_merged_output() {
    let sink = Arc::new(CollectingEventSink::new());
    let config = PipelineConfig::new(Alphabet::latin(), never)
        .with_overall_deadline(Duration::from_secs(10))
        .with_per_branch_deadline(Duration::from_millis(20));

    let outcome = run_pipeline_with_sink(config, sink.clone()).await.unwrap();

    assert!(matches!(outcome, Outcome::Exhausted { .. }));
    assert!(outcome.elapsed() < Duration::from_secs(10));
    assert!(outcome.drain().is_clean());
    assert_eq!(sink.exit_reason("transform:w1"), Some(ExitReason::Cancelled));
    assert_eq!(sink.exit_reason(MERGE_STAGE), Some(ExitReason::InputExhausted));
    assert_outputs_closed_once(&sink);
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let config = PipelineConfig::new(Alphabet::latin(), never).with_branch_count(0);

    let err = run_pipeline(config).await.unwrap_err();
    assert!(matches!(err, FanflowError::InvalidConfig(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropping_the_run_cancels_stages() {
    let sink = Arc::new(CollectingEventSink::new());
    let config = PipelineConfig::new(Alphabet::latin(), never)
        .with_overall_deadline(Duration::from_secs(60));

    let run = run_pipeline_with_sink(config, sink.clone());
    assert!(tokio::time::timeout(Duration::from_millis(20), run).await.is_err());

    // Give the orphaned stages a moment to observe the signal.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.exit_reason(SOURCE_STAGE), Some(ExitReason::Cancelled));
    assert_eq!(
        sink.events_for(MERGE_STAGE).last(),
        Some(&StageEvent::OutputClosed {
            stage: MERGE_STAGE.to_string()
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_branch_with_custom_mapper() {
    let config = PipelineConfig::new(|i: usize| i * 10, |v: &Labeled<usize>| v.value == 70)
        .with_branch_count(1)
        .with_overall_deadline(Duration::from_secs(10));

    let outcome = run_pipeline(config).await.unwrap();
    let value = outcome.into_value().unwrap();
    assert_eq!(value.label(), "w1");
    assert_eq!(value.value, 70);
}
