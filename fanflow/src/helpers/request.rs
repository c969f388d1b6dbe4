//! Inbound request handling under a fixed response deadline.

use crate::cancellation::CancellationSignal;
use crate::context::{RequestIdGenerator, REQUEST_ID};
use crate::errors::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Handles one request, observing the request's signal.
///
/// The signal carries the request id under [`REQUEST_ID`] and fires when the
/// response deadline elapses.
#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static {
    /// Produces the response payload.
    async fn handle(&self, signal: CancellationSignal) -> T;
}

#[async_trait]
impl<T, F, Fut> RequestHandler<T> for F
where
    T: Send + 'static,
    F: Fn(CancellationSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send,
{
    async fn handle(&self, signal: CancellationSignal) -> T {
        self(signal).await
    }
}

/// What a deadline-bounded request produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HandlerResponse<T> {
    /// The handler finished in time.
    Completed {
        /// Id assigned to the request.
        request_id: u64,
        /// Handler output.
        value: T,
    },
    /// The deadline elapsed first; `value` is the caller's fallback.
    Fallback {
        /// Id assigned to the request.
        request_id: u64,
        /// Fallback payload.
        value: T,
    },
}

impl<T> HandlerResponse<T> {
    /// Id assigned to the request.
    #[must_use]
    pub const fn request_id(&self) -> u64 {
        match self {
            Self::Completed { request_id, .. } | Self::Fallback { request_id, .. } => *request_id,
        }
    }

    /// Returns true if the fallback was used.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Returns the payload, whichever way it was produced.
    pub fn into_value(self) -> T {
        match self {
            Self::Completed { value, .. } | Self::Fallback { value, .. } => value,
        }
    }
}

/// Runs `handler` for one request with a response deadline.
///
/// Derives a child of `parent` that fires after `deadline` and carries a fresh
/// id from `ids`. If the child fires before the handler finishes, `fallback`
/// is returned straight away and the handler is left to observe the fired
/// signal on its own. The child is fired once the request is answered either
/// way. A panicking handler surfaces as [`FanflowError::Join`](crate::errors::FanflowError::Join).
pub async fn handle_with_deadline<T, H>(
    parent: &CancellationSignal,
    ids: &RequestIdGenerator,
    deadline: Duration,
    fallback: T,
    handler: Arc<H>,
) -> Result<HandlerResponse<T>>
where
    T: Send + 'static,
    H: RequestHandler<T> + ?Sized,
{
    let request_id = ids.next_id();
    let signal = parent
        .child_with_deadline(deadline)
        .with_value(&REQUEST_ID, request_id);

    let mut task = tokio::spawn({
        let signal = signal.clone();
        async move { handler.handle(signal).await }
    });

    let response = tokio::select! {
        biased;
        reason = signal.triggered() => {
            debug!(request_id, %reason, "Request gave up, answering with fallback");
            HandlerResponse::Fallback { request_id, value: fallback }
        }
        joined = &mut task => HandlerResponse::Completed { request_id, value: joined? },
    };

    signal.cancel("request answered");
    Ok(response)
}
