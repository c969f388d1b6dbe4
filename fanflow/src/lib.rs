//! # Fanflow
//!
//! Cancellable fan-out/fan-in pipelines on tokio.
//!
//! A source emits an endless sequence of indices, several transform branches
//! share that sequence, and a merge stage recombines their outputs into one
//! stream. Everything runs under one cancellation signal:
//!
//! - **Cancellation signals**: a tree of broadcast-once stop notifications with deadlines
//! - **Typed context**: immutable value scopes carried by signals
//! - **Stages**: tasks that own exactly one output and close it exactly once
//! - **Driver**: reads merged output until a predicate matches or the deadline elapses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fanflow::prelude::*;
//! use std::time::Duration;
//!
//! # async fn demo() -> fanflow::errors::Result<()> {
//! let config = PipelineConfig::new(Alphabet::latin(), |v: &Labeled<char>| {
//!     v.to_string() == "w1: z"
//! })
//! .with_branch_labels(["w1", "w2"])
//! .with_overall_deadline(Duration::from_millis(500));
//!
//! match run_pipeline(config).await? {
//!     Outcome::Matched { value, elapsed, .. } => println!("{value} after {elapsed:?}"),
//!     other => println!("no match: {}", other.kind()),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod errors;
pub mod events;
pub mod helpers;
pub mod observability;
pub mod pipeline;
pub mod stages;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancelReason, CancellationSignal, DrainReport, TriggerGuard};
    pub use crate::context::{ContextKey, RequestIdGenerator, RunIdentity, Scope, BRANCH_LABEL};
    pub use crate::errors::FanflowError;
    pub use crate::events::{
        CollectingEventSink, EventSink, ExitReason, LoggingEventSink, NoOpEventSink, StageEvent,
    };
    pub use crate::helpers::{handle_with_deadline, HandlerResponse, RequestHandler};
    pub use crate::pipeline::{
        run_pipeline, run_pipeline_with_sink, Outcome, PipelineConfig, PipelineSettings,
        PipelineState,
    };
    pub use crate::stages::{
        generate, merge, transform, Alphabet, FanOutReceiver, Labeled, Mapper, StageRuntime,
    };
}
