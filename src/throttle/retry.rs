//! Bounded exponential backoff with server-directed delays.

use super::{jittered, Clock, DEFAULT_JITTER};
use crate::error::Retryable;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry budget and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub backoff_initial: Duration,
    /// Jitter fraction applied to every delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_initial: Duration::from_millis(750),
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Exponential delay for the given 1-based retry attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30);
        self.backoff_initial.saturating_mul(1u32 << exponent)
    }
}

/// Runs an operation until it succeeds, fails permanently, or exhausts the
/// retry budget. The last failure is returned as-is.
pub struct RetryExecutor {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!("Not retrying: {}", err);
                return Err(err);
            }

            attempt += 1;
            if attempt > self.policy.max_retries {
                warn!("Giving up after {} retries: {}", self.policy.max_retries, err);
                return Err(err);
            }

            let delay = self.delay_for(attempt, err.retry_after());
            let delay = jittered(delay, self.policy.jitter);
            warn!(
                "Retry {}/{} in {:.2}s: {}",
                attempt,
                self.policy.max_retries,
                delay.as_secs_f64(),
                err
            );
            self.clock.sleep(delay).await;
        }
    }

    /// Server hint if it parses, exponential backoff otherwise.
    fn delay_for(&self, attempt: u32, hint: Option<&str>) -> Duration {
        hint.and_then(|value| parse_retry_after(value, Utc::now()))
            .unwrap_or_else(|| self.policy.backoff(attempt))
    }
}

/// Parse a `Retry-After` header value relative to `now`.
///
/// Accepts delay-seconds (fractional allowed, negatives clamp to zero) or an
/// HTTP-date; a date in the past yields zero. Returns `None` when the value
/// is neither.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        return Some(Duration::from_secs_f64(seconds.max(0.0)));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
