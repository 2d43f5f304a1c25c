//! Subcommand orchestration.
//!
//! Each submodule wires the core pieces (client, pacing, batch driver,
//! stores) together for one subcommand and prints a short summary.

pub mod apply_modes;
pub mod build_modes;
pub mod sync;
pub mod update_modes;

use crate::batch::BatchOptions;
use crate::config::{Config, ThrottleConfig};
use crate::throttle::{Clock, RateLimiter, RetryExecutor};
use std::sync::Arc;

/// The two pacing layers every upstream request passes through.
pub struct Pacing {
    pub limiter: RateLimiter,
    pub retry: RetryExecutor,
}

impl Pacing {
    pub fn new(config: &ThrottleConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = RateLimiter::new(config.rate, clock.clone()).with_jitter(config.jitter);
        let retry = RetryExecutor::new(config.retry_policy(), clock);
        Self { limiter, retry }
    }
}

fn batch_options(config: &Config, shuffle: bool, show_progress: bool) -> BatchOptions {
    BatchOptions {
        checkpoint_every: config.batch.checkpoint_every,
        progress_every: config.batch.progress_every,
        shuffle,
        show_progress,
    }
}
