//! Collaborators that sit at the edge of a pipeline.
//!
//! Both derive their lifetime from a cancellation signal: an inbound request
//! gets its own child signal with a response deadline, and an outbound call
//! is abandoned as soon as its signal fires.

#[cfg(feature = "http")]
mod http;
mod request;

#[cfg(feature = "http")]
pub use http::fetch_text;
pub use request::{handle_with_deadline, HandlerResponse, RequestHandler};
