//! Outbound HTTP calls bounded by a cancellation signal.

use crate::cancellation::CancellationSignal;
use crate::errors::{FanflowError, Result};
use tracing::debug;

/// Fetches `url` and returns the response body as text.
///
/// The transfer is raced against `signal`: if it fires first the in-flight
/// request is dropped, which aborts the connection, and
/// [`FanflowError::Cancelled`] is returned with the signal's reason.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    signal: &CancellationSignal,
) -> Result<String> {
    if let Some(reason) = signal.reason() {
        return Err(FanflowError::Cancelled(reason));
    }

    let transfer = async {
        let response = client.get(url).send().await?.error_for_status()?;
        response.text().await
    };

    tokio::select! {
        biased;
        reason = signal.triggered() => {
            debug!(%url, %reason, "Aborting HTTP transfer");
            Err(FanflowError::Cancelled(reason))
        }
        body = transfer => body.map_err(|e| FanflowError::Http(e.to_string())),
    }
}
