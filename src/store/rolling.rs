//! Rolling window of daily mode-total batches.

use crate::models::ModeRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default number of calendar days kept.
pub const DEFAULT_DAYS: usize = 10;

/// Mode totals refreshed on one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// ISO date (`YYYY-MM-DD`).
    pub date: String,
    #[serde(default)]
    pub changes: Vec<ModeRow>,
}

/// The `{batches: [...]}` document behind the rolling change file.
///
/// Holds at most one batch per date, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeChangeStore {
    #[serde(default)]
    pub batches: Vec<ChangeBatch>,
}

impl ModeChangeStore {
    /// Fold `rows` into the batch for `today` and enforce the retention window.
    ///
    /// Rows for a reference already present today replace the earlier entry
    /// in place; new references are appended. `days` below 1 is treated as 1.
    pub fn merge_batch(&mut self, today: NaiveDate, rows: Vec<ModeRow>, days: usize) {
        let date = today.format("%Y-%m-%d").to_string();

        match self.batches.iter_mut().find(|batch| batch.date == date) {
            Some(batch) => merge_rows(&mut batch.changes, rows),
            None => self.batches.push(ChangeBatch {
                date,
                changes: rows,
            }),
        }

        self.batches.sort_by(|a, b| b.date.cmp(&a.date));
        self.batches.truncate(days.max(1));
    }

    /// Most recent row per reference across all retained days, by reference.
    pub fn latest(&self) -> Vec<ModeRow> {
        let mut latest: BTreeMap<&str, &ModeRow> = BTreeMap::new();
        // Batches are newest first; walk oldest to newest so recent days win.
        for batch in self.batches.iter().rev() {
            for row in &batch.changes {
                latest.insert(row.reference.as_str(), row);
            }
        }
        latest.into_values().cloned().collect()
    }

    pub fn dates(&self) -> Vec<&str> {
        self.batches.iter().map(|b| b.date.as_str()).collect()
    }
}

/// Last write wins per reference, keeping first-seen order.
fn merge_rows(existing: &mut Vec<ModeRow>, incoming: Vec<ModeRow>) {
    let mut index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, row)| (row.reference.clone(), i))
        .collect();

    for row in incoming {
        match index.get(&row.reference) {
            Some(&i) => existing[i] = row,
            None => {
                index.insert(row.reference.clone(), existing.len());
                existing.push(row);
            }
        }
    }
}
