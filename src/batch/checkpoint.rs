//! Where batch results go while a run is in flight.

use crate::models::ModeRow;
use crate::store;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receives the complete accumulated result list at every checkpoint and
/// once more when the run ends.
pub trait CheckpointSink {
    fn write(&mut self, rows: &[ModeRow]) -> Result<()>;

    /// Short label for log lines.
    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Rewrites a flat JSON array of rows on every write.
///
/// The same file is the resume source for the next run.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows saved by a previous run, or nothing when the file is absent.
    pub fn load(&self) -> Result<Vec<ModeRow>> {
        let rows: Vec<ModeRow> = store::read_json_opt(&self.path)?.unwrap_or_default();
        if !rows.is_empty() {
            info!("Loaded {} rows from {}", rows.len(), self.path.display());
        }
        Ok(rows)
    }
}

impl CheckpointSink for JsonFileSink {
    fn write(&mut self, rows: &[ModeRow]) -> Result<()> {
        store::write_json(&self.path, rows)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Discards writes; the caller persists the returned rows itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCheckpoint;

impl CheckpointSink for NoCheckpoint {
    fn write(&mut self, _rows: &[ModeRow]) -> Result<()> {
        Ok(())
    }
}
