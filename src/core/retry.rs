//! Bounded retry with exponential backoff.
//!
//! A failed attempt is retried only when [`LmcError::is_retryable`] says so
//! (timeouts, transport failures, 5xx). The delay before retry `n` (counted
//! from 0) is `base_delay * 2^n`.

use std::future::Future;
use std::time::Duration;

use crate::error::{LmcError, Result};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retry settings shared by all provider clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given retry count and base delay.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor)
    }

    /// Total attempts including the first one.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Run `op` until it succeeds, fails terminally, or retries run out.
///
/// `op` receives the 0-based attempt number.
///
/// # Errors
///
/// Returns the last error when it is not retryable or retries are exhausted.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, provider: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(provider, attempts = attempt + 1, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if should_retry(&err, attempt, policy) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    provider,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::debug!(provider, attempts = attempt + 1, error = %err, "Giving up");
                return Err(err);
            }
        }
    }
}

const fn should_retry(err: &LmcError, attempt: u32, policy: &RetryPolicy) -> bool {
    err.is_retryable() && attempt < policy.max_retries
}
