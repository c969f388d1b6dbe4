//! Pipeline configuration and the driver that runs it.
//!
//! This module provides:
//! - Serializable settings with environment overrides
//! - The driver state machine and its outcome
//! - `run_pipeline`, which wires source, branches and merge under one signal

mod config;
mod driver;
mod outcome;
mod state;

#[cfg(test)]
mod integration_tests;

pub use config::{PipelineConfig, PipelineSettings, ENV_PREFIX};
pub use driver::{run_pipeline, run_pipeline_with_sink};
pub use outcome::Outcome;
pub use state::PipelineState;
