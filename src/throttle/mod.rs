//! Request pacing.
//!
//! Two independent layers sit in front of every upstream call: the
//! [`RateLimiter`] decides *when* a request may start, the [`RetryExecutor`]
//! decides whether and when a failed request runs again. Both sleep through a
//! [`Clock`] so tests can run them against virtual time.

pub mod clock;
pub mod rate_limiter;
pub mod retry;

pub use clock::{Clock, SystemClock};
pub use rate_limiter::RateLimiter;
pub use retry::{RetryExecutor, RetryPolicy};

use rand::Rng;
use std::time::Duration;

/// Default jitter fraction applied to every computed sleep.
pub const DEFAULT_JITTER: f64 = 0.2;

/// Scale `base` by a random factor in `[1 - fraction, 1 + fraction]`.
///
/// A non-positive fraction returns `base` unchanged. The result never goes
/// below zero.
pub fn jittered(base: Duration, fraction: f64) -> Duration {
    if !(fraction > 0.0) || base.is_zero() {
        return base;
    }
    let fraction = fraction.min(1.0);
    let factor = 1.0 + rand::thread_rng().gen_range(-fraction..=fraction);
    Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
}
