//! Checkpointed, resumable batch fetching.
//!
//! Drives the rate limiter and retry executor over a list of references,
//! reduces each activation payload to mode totals and periodically hands the
//! full accumulated result to a [`CheckpointSink`]. The checkpoint doubles as
//! the resume source: a reference present in it is done.

pub mod checkpoint;

pub use checkpoint::{CheckpointSink, JsonFileSink, NoCheckpoint};

use crate::analysis::aggregate_modes;
use crate::error::FetchError;
use crate::models::ModeRow;
use crate::throttle::{RateLimiter, RetryExecutor};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Write the full result list after every N completed rows; 0 disables.
    pub checkpoint_every: usize,
    /// Log progress after every N processed references; 0 disables.
    pub progress_every: usize,
    /// Randomize the order of pending references.
    pub shuffle: bool,
    /// Draw a terminal progress bar.
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            checkpoint_every: 500,
            progress_every: 50,
            shuffle: false,
            show_progress: false,
        }
    }
}

/// References from `references` that have no row in `done`, optionally shuffled.
pub fn pending_references(references: &[String], done: &[ModeRow], shuffle: bool) -> Vec<String> {
    let processed: HashSet<&str> = done.iter().map(|row| row.reference.as_str()).collect();
    let mut pending: Vec<String> = references
        .iter()
        .filter(|r| !processed.contains(r.as_str()))
        .cloned()
        .collect();
    if shuffle {
        pending.shuffle(&mut rand::thread_rng());
    }
    pending
}

/// Sequential fetch-and-aggregate driver.
pub struct BatchProcessor<'a> {
    limiter: &'a mut RateLimiter,
    retry: &'a RetryExecutor,
    options: BatchOptions,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(limiter: &'a mut RateLimiter, retry: &'a RetryExecutor, options: BatchOptions) -> Self {
        Self {
            limiter,
            retry,
            options,
        }
    }

    /// Process every reference not already in `prior` and return `prior`
    /// extended with the new rows.
    ///
    /// A fetch that still fails after retries aborts the run. Completed rows
    /// are flushed to the sink once more before the error is returned.
    pub async fn run<F, Fut, S>(
        &mut self,
        references: &[String],
        prior: Vec<ModeRow>,
        mut fetch: F,
        sink: &mut S,
    ) -> Result<Vec<ModeRow>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<Value, FetchError>>,
        S: CheckpointSink + ?Sized,
    {
        let pending = pending_references(references, &prior, self.options.shuffle);
        if !prior.is_empty() {
            info!(
                "Resuming: {} already done, {} remaining",
                prior.len(),
                pending.len()
            );
        }

        let progress = self.progress_bar(pending.len());
        let total = pending.len();
        let mut rows = prior;

        for (i, reference) in pending.into_iter().enumerate() {
            let processed = i + 1;
            self.limiter.acquire().await;

            let payload = match self.retry.run(|| fetch(reference.clone())).await {
                Ok(payload) => payload,
                Err(err) => {
                    error!("Giving up on {} ({}): {}", reference, err.kind(), err);
                    progress.abandon();
                    if let Err(flush_err) = sink.write(&rows) {
                        warn!("Could not save progress before aborting: {:#}", flush_err);
                    }
                    return Err(err).with_context(|| {
                        format!("Failed to fetch activations for {}", reference)
                    });
                }
            };

            let totals = aggregate_modes(&payload);
            debug!("{}: {}", reference, totals);
            rows.push(ModeRow::new(reference, totals));
            progress.inc(1);

            let every = self.options.checkpoint_every;
            if every > 0 && rows.len() % every == 0 {
                sink.write(&rows).context("Checkpoint write failed")?;
                info!("[checkpoint] wrote {} rows to {}", rows.len(), sink.describe());
            }

            let every = self.options.progress_every;
            if every > 0 && processed % every == 0 {
                info!("[{}/{}] processed (total {})", processed, total, rows.len());
            }
        }

        progress.finish_and_clear();
        sink.write(&rows).context("Final write failed")?;
        Ok(rows)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
