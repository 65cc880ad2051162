//! HTTP client utilities.
//!
//! Provides the shared client builder plus the status/error classification
//! every provider adapter goes through.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::retry::{RetryPolicy, retry};
use crate::error::{LmcError, Result};

/// Default timeout for hosted chat requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for cost lookups and model listings.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider error message kept verbatim.
const MAX_ERROR_BODY: usize = 300;

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("lmc/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| LmcError::Network {
            provider: "http".to_string(),
            message: e.to_string(),
        })
}

/// Map a transport-level `reqwest` error.
#[must_use]
pub fn classify_send_error(provider: &str, timeout: Duration, err: &reqwest::Error) -> LmcError {
    if err.is_timeout() {
        LmcError::Timeout {
            provider: provider.to_string(),
            seconds: timeout.as_secs(),
        }
    } else if err.is_connect() {
        LmcError::Network {
            provider: provider.to_string(),
            message: format!("{CONNECT_FAILED}: {err}"),
        }
    } else {
        LmcError::Network {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Prefix on network errors raised while connecting.
const CONNECT_FAILED: &str = "connection failed";

/// Whether a transport error was a refused/failed connection.
#[must_use]
pub fn is_connect_error(err: &LmcError) -> bool {
    matches!(err, LmcError::Network { message, .. } if message.starts_with(CONNECT_FAILED))
}

/// Pull a human-readable message out of an error body.
///
/// Tries `error.message`, then a string `error`, then `message`/`detail`,
/// and finally the raw body.
#[must_use]
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error").filter(|v| v.is_string()),
            value.get("message"),
            value.get("detail"),
        ];
        if let Some(msg) = candidates.into_iter().flatten().find_map(|v| v.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Turn a non-success response into the matching error.
///
/// Success responses are passed through untouched.
///
/// # Errors
///
/// `RateLimited` for 429, `ServerError` for 5xx, `ProviderApi` otherwise.
pub async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body);

    tracing::debug!(provider, status = status.as_u16(), %message, "Provider returned error status");

    Err(if status == StatusCode::TOO_MANY_REQUESTS {
        LmcError::RateLimited {
            provider: provider.to_string(),
            retry_after,
            message,
        }
    } else if status.is_server_error() {
        LmcError::ServerError {
            provider: provider.to_string(),
            status_code: status.as_u16(),
            message,
        }
    } else {
        LmcError::ProviderApi {
            provider: provider.to_string(),
            status_code: Some(status.as_u16()),
            message,
        }
    })
}

/// Send one request and decode a JSON body.
///
/// # Errors
///
/// Transport, status, or decode failures.
pub async fn send_json<T: DeserializeOwned>(
    provider: &str,
    timeout: Duration,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_send_error(provider, timeout, &e))?;
    let response = check_status(provider, response).await?;

    let body = response
        .text()
        .await
        .map_err(|e| classify_send_error(provider, timeout, &e))?;
    serde_json::from_str(&body).map_err(|e| LmcError::ParseResponse {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

/// Send a request built fresh by `build` for every attempt, retrying
/// transient failures under `policy`.
///
/// # Errors
///
/// The last error once retries are exhausted or on a terminal failure.
pub async fn send_with_retry<T, F>(
    provider: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    build: F,
) -> Result<T>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    retry(policy, provider, |attempt| {
        tracing::debug!(provider, attempt = attempt + 1, "Sending request");
        send_json(provider, timeout, build())
    })
    .await
}
