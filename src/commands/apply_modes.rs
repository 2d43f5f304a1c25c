//! `apply-modes`: fold mode totals back into a catalog snapshot.

use crate::config::Config;
use crate::models::{Catalog, ModeRow};
use crate::store::{self, ModeChangeStore};
use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Accepted layouts for the totals file.
#[derive(Deserialize)]
#[serde(untagged)]
enum ModesFile {
    Rows(Vec<ModeRow>),
    Store(ModeChangeStore),
}

/// Rows from a flat row list, or the latest view of a rolling store.
pub fn load_mode_rows(path: &Path) -> Result<Vec<ModeRow>> {
    Ok(match store::read_json::<ModesFile>(path)? {
        ModesFile::Rows(rows) => rows,
        ModesFile::Store(change_store) => {
            debug!("{} is a rolling store, using its latest view", path.display());
            change_store.latest()
        }
    })
}

/// Set `modeTotals` and `qsos` on every park that has a row.
///
/// Returns how many parks were updated; rows for unknown parks are skipped.
pub fn fold_mode_totals(catalog: &mut Catalog, rows: &[ModeRow]) -> usize {
    let mut updated = 0;
    for row in rows {
        match catalog.get_mut(&row.reference) {
            Some(park) => {
                park.apply_mode_totals(row.totals);
                updated += 1;
            }
            None => debug!("No park {} in catalog, skipping", row.reference),
        }
    }
    updated
}

pub fn run(config: &Config, out: Option<PathBuf>) -> Result<usize> {
    let snapshot = &config.paths.snapshot;
    let modes = &config.paths.modes_base;
    if !snapshot.exists() {
        bail!("Snapshot not found: {}", snapshot.display());
    }

    let mut catalog = store::load_catalog(snapshot)?;
    let rows = load_mode_rows(modes)?;
    println!(
        "📥 Applying {} mode rows from {} to {} parks",
        rows.len(),
        modes.display(),
        catalog.len()
    );

    let updated = fold_mode_totals(&mut catalog, &rows);
    if updated < rows.len() {
        warn!(
            "{} rows did not match any park in {}",
            rows.len() - updated,
            snapshot.display()
        );
    }

    let out = out.unwrap_or_else(|| snapshot.clone());
    store::save_catalog(&out, &catalog)?;
    println!("\n✅ Updated {} parks, written to {}", updated, out.display());
    Ok(updated)
}
