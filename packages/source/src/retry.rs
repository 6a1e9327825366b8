//! HTTP retry helper for transient upstream errors.
//!
//! Page fetches go through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so every request gets the
//! same small, fixed-backoff retry budget.
//!
//! # Usage
//!
//! ```ignore
//! let page: Vec<RawRecord> =
//!     retry::send_json(|| client.get(&url).query(&params), &policy).await?;
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Retry budget for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `2` means at most three requests.
    pub retries: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Total number of requests this policy allows.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Outcome of one attempt that did not produce a value.
enum AttemptError {
    /// Worth another try (timeouts, connection errors, 429, 5xx, bad body).
    Transient(String),
    /// Retrying will not help (4xx other than 429).
    Permanent(String),
    /// The body arrived but is not the expected JSON.
    Decode(String),
}

/// Sends an HTTP request and decodes the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// # Retry behaviour
///
/// Connection errors, timeouts, HTTP 429 and HTTP 5xx are retried up to
/// `policy.retries` times with a fixed `policy.backoff` delay. Bodies that
/// fail to decode are re-fetched within the same budget. HTTP 4xx other
/// than 429 fails immediately.
///
/// # Errors
///
/// Returns [`SourceError::SourceUnavailable`] once the budget is spent or on
/// a permanent HTTP failure, and [`SourceError::Decode`] if the final
/// attempt returned a body that is not valid JSON for `T`.
pub async fn send_json<T, F>(build_request: F, policy: &RetryPolicy) -> Result<T, SourceError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match try_once(&build_request).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match error {
            AttemptError::Permanent(message) => {
                log::error!("upstream rejected request: {message}");
                return Err(SourceError::SourceUnavailable {
                    attempts: attempt,
                    message,
                });
            }
            AttemptError::Transient(message) if attempt < max_attempts => {
                log::warn!(
                    "  attempt {attempt}/{max_attempts} failed: {message}; retrying in {:?}",
                    policy.backoff
                );
            }
            AttemptError::Decode(message) if attempt < max_attempts => {
                log::warn!(
                    "  attempt {attempt}/{max_attempts} returned an undecodable body: {message}; \
                     re-fetching in {:?}",
                    policy.backoff
                );
            }
            AttemptError::Transient(message) => {
                log::error!("upstream unavailable after {attempt} attempt(s): {message}");
                return Err(SourceError::SourceUnavailable {
                    attempts: attempt,
                    message,
                });
            }
            AttemptError::Decode(message) => {
                log::error!("undecodable upstream body after {attempt} attempt(s): {message}");
                return Err(SourceError::Decode { message });
            }
        }

        if !policy.backoff.is_zero() {
            tokio::time::sleep(policy.backoff).await;
        }
    }
}

async fn try_once<T, F>(build_request: &F) -> Result<T, AttemptError>
where
    T: DeserializeOwned,
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = build_request().send().await.map_err(|e| {
        if is_transient(&e) {
            AttemptError::Transient(e.to_string())
        } else {
            AttemptError::Permanent(e.to_string())
        }
    })?;

    let status = response.status();
    let url = response.url().to_string();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(AttemptError::Transient(format!("HTTP {status} from {url}")));
    }
    if status.is_client_error() {
        return Err(AttemptError::Permanent(format!("HTTP {status} from {url}")));
    }

    // Read the raw body first so the failure log can show what arrived.
    let text = response
        .text()
        .await
        .map_err(|e| AttemptError::Transient(format!("body read failed: {e}")))?;

    serde_json::from_str(&text).map_err(|e| {
        let preview = if text.len() > BODY_PREVIEW_LEN {
            format!("{}...", text.chars().take(BODY_PREVIEW_LEN).collect::<String>())
        } else {
            text.clone()
        };
        log::debug!("body preview from {url}: {preview}");
        AttemptError::Decode(format!(
            "{e} (status={status}, received {} bytes)",
            text.len()
        ))
    })
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
