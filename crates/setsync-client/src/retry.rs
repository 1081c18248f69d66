//! Retry logic with exponential backoff for idempotent audit API reads.
//!
//! Retries only on transport errors (connection failures, timeouts).
//! Status codes are the caller's concern and are never retried here.
//! Mutating calls (audits, remediation, publish) are sent exactly once.

use std::time::Duration;

/// Maximum number of retry attempts after the initial request.
const MAX_RETRIES: u32 = 2;

/// Base delay between retries (doubles each attempt: 200ms, 400ms).
const BASE_DELAY_MS: u64 = 200;

/// Send a request, retrying transport failures with exponential backoff.
pub(crate) async fn retry_send<F, Fut>(
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..MAX_RETRIES {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "audit API request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    f().await
}
