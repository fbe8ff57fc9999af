//! Retry classification and backoff.
//!
//! Retried: connection errors, per-attempt timeouts, and responses with
//! status 429 or 5xx. A `X-Should-Retry: false` response header suppresses
//! the retry of an otherwise retryable status.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::RetryConfig;
use crate::{Error, Response};

/// Longest server-suggested delay that is honoured.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Share of the computed delay removed at random, at most.
const JITTER: f64 = 0.25;

/// Decides whether and when a failed attempt is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from retry parameters.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The retry parameters.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns `true` if a non-2xx response should be retried.
    #[must_use]
    pub fn should_retry_response(response: &Response<Bytes>) -> bool {
        response.header("x-should-retry") != Some("false")
            && ledgerkit_core::is_retryable_status(response.status())
    }

    /// Returns `true` if a transport error should be retried.
    #[must_use]
    pub fn should_retry_error(error: &Error) -> bool {
        error.is_connection() || error.is_timeout()
    }

    /// Delay the server asked for, from `retry-after-ms` or `retry-after`.
    ///
    /// `retry-after` may hold seconds or an HTTP date. Values above 60 s or
    /// in the past are ignored.
    #[must_use]
    pub fn retry_after(response: &Response<Bytes>) -> Option<Duration> {
        let millis = response
            .header("retry-after-ms")
            .and_then(|value| value.trim().parse::<f64>().ok())
            .map(|ms| ms / 1000.0);

        let seconds = millis.or_else(|| {
            let value = response.header("retry-after")?.trim();
            value.parse::<f64>().ok().or_else(|| {
                let date = DateTime::parse_from_rfc2822(value).ok()?;
                let delta = date.with_timezone(&Utc) - Utc::now();
                delta.to_std().ok().map(|delay| delay.as_secs_f64())
            })
        })?;

        (seconds.is_finite() && (0.0..=MAX_RETRY_AFTER.as_secs_f64()).contains(&seconds))
            .then(|| Duration::from_secs_f64(seconds))
    }

    /// Computed delay before retry number `retry` (0-based).
    ///
    /// `min(initial_delay * 2^retry, max_delay)`, reduced by a random factor
    /// in `[0, 0.25)`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base = self.config.initial_delay.as_secs_f64() * 2_f64.powi(exponent);
        let capped = base.min(self.config.max_delay.as_secs_f64());
        let jitter = 1.0 - rand::thread_rng().gen_range(0.0..JITTER);
        Duration::try_from_secs_f64(capped * jitter).unwrap_or(self.config.max_delay)
    }

    /// Delay before retry number `retry`, preferring the server's hint.
    #[must_use]
    pub fn delay(&self, retry: u32, response: Option<&Response<Bytes>>) -> Duration {
        response
            .and_then(Self::retry_after)
            .unwrap_or_else(|| self.backoff(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
