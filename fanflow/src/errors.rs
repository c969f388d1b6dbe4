//! Error types for the fanflow pipeline core.
//!
//! Stages never return errors: a stage either publishes a value or exits
//! silently. The variants here surface only at the edges, when a pipeline is
//! configured or when an external collaborator gives up because its signal
//! fired.

use crate::cancellation::CancelReason;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, FanflowError>;

/// The main error type for fanflow operations.
#[derive(Debug, Error)]
pub enum FanflowError {
    /// The pipeline settings failed validation.
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// An operation observed its cancellation signal before finishing.
    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),

    /// A spawned task could not be joined.
    #[error("Task join error: {0}")]
    Join(String),

    /// Settings could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An outbound HTTP call failed.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(String),
}

impl FanflowError {
    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if this error is the result of a fired signal.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns true if this error was caused by an elapsed deadline.
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::Cancelled(reason) if reason.is_deadline())
    }
}

impl From<tokio::task::JoinError> for FanflowError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let err = FanflowError::invalid_config("branch_count must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid pipeline configuration: branch_count must be at least 1"
        );
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_deadline() {
        let err = FanflowError::Cancelled(CancelReason::DeadlineExceeded);
        assert!(err.is_cancelled());
        assert!(err.is_deadline_exceeded());
        assert_eq!(err.to_string(), "Operation cancelled: deadline exceeded");
    }

    #[test]
    fn test_cancelled_by_parent_deadline() {
        let reason = CancelReason::ParentCancelled(Box::new(CancelReason::DeadlineExceeded));
        let err = FanflowError::Cancelled(reason);
        assert!(err.is_deadline_exceeded());
    }

    #[test]
    fn test_serialization_from() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: FanflowError = parse.unwrap_err().into();
        assert!(matches!(err, FanflowError::Serialization(_)));
    }
}
