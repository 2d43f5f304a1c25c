//! Token-bucket request throttle.

use super::{jittered, Clock, DEFAULT_JITTER};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sleep used when the configured rate cannot produce a token.
const FALLBACK_WAIT: Duration = Duration::from_millis(500);

/// Bounds the long-run request rate to `rate` per second.
///
/// The bucket holds at most `rate` tokens and refills continuously, so an
/// idle limiter lets a short burst through before pacing resumes. Callers
/// are expected to be sequential; the limiter is owned by whoever drives the
/// requests and borrowed mutably for each `acquire`.
pub struct RateLimiter {
    rate: f64,
    tokens: f64,
    last_refill: Instant,
    jitter: f64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter that starts with an empty bucket.
    pub fn new(rate: f64, clock: Arc<dyn Clock>) -> Self {
        let last_refill = clock.now();
        Self {
            rate,
            tokens: 0.0,
            last_refill,
            jitter: DEFAULT_JITTER,
            clock,
        }
    }

    /// Override the jitter fraction applied to waits.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Wait until one more request is permitted.
    pub async fn acquire(&mut self) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let capacity = self.rate.max(0.0);
        self.tokens = (self.tokens + elapsed * capacity).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return;
        }

        let wait = if self.rate > 0.0 {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        } else {
            FALLBACK_WAIT
        };
        let wait = jittered(wait, self.jitter);
        debug!("Rate limiter waiting {:.3}s", wait.as_secs_f64());
        self.clock.sleep(wait).await;

        self.tokens = 0.0;
        self.last_refill = self.clock.now();
    }
}
