//! Well-known context keys.

use super::ContextKey;
use uuid::Uuid;

/// Label a transform branch prefixes onto its output.
pub const BRANCH_LABEL: ContextKey<String> = ContextKey::new("branch_label");

/// ID of the request a signal was derived for.
pub const REQUEST_ID: ContextKey<u64> = ContextKey::new("request_id");

/// ID of the pipeline run a signal belongs to.
pub const RUN_ID: ContextKey<Uuid> = ContextKey::new("run_id");
