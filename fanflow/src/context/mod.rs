//! Request-scoped context values.
//!
//! This module provides:
//! - Typed keys and immutable, layered value scopes
//! - The well-known keys stages and helpers read
//! - Run identity and request id generation

mod identity;
mod keys;
mod scope;

pub use identity::{RequestIdGenerator, RunIdentity};
pub use keys::{BRANCH_LABEL, REQUEST_ID, RUN_ID};
pub use scope::{ContextKey, Scope};
