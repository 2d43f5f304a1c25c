//! `sync`: reconcile the local catalog snapshot with upstream.

use super::Pacing;
use crate::analysis::{diff_catalogs, CatalogDiff, PARK_ADDED, PARK_DELETED};
use crate::api::PotaClient;
use crate::config::Config;
use crate::models::Catalog;
use crate::store;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info};

/// What one sync run found and wrote.
#[derive(Debug)]
pub struct SyncReport {
    pub parks: usize,
    pub diff: CatalogDiff,
    /// Marker file written for activity changes, if any.
    pub marker: Option<PathBuf>,
}

/// Marker file name for a capture instant: `updateQSO.YYYYMMDDTHHMMSSZ`.
pub fn marker_file_name(at: DateTime<Utc>) -> String {
    format!("updateQSO.{}", at.format("%Y%m%dT%H%M%SZ"))
}

/// Fetch every region and merge them; a later region wins on collision.
pub async fn fetch_catalog(
    client: &PotaClient,
    regions: &[String],
    pacing: &mut Pacing,
) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    for region in regions {
        pacing.limiter.acquire().await;
        let parks = pacing
            .retry
            .run(|| client.fetch_region(region))
            .await
            .with_context(|| format!("Failed to fetch parks for region {}", region))?;

        info!("Fetched {} parks for {}", parks.len(), region);
        catalog.extend(parks.into_iter().map(|park| (park.reference.clone(), park)));
    }

    Ok(catalog)
}

pub async fn run(
    config: &Config,
    dry_run: bool,
    client: &PotaClient,
    pacing: &mut Pacing,
) -> Result<SyncReport> {
    let paths = &config.paths;

    println!("📂 Loading snapshot: {}", paths.snapshot.display());
    let old = store::load_catalog(&paths.snapshot)?;
    if old.is_empty() {
        info!("No prior snapshot, every park will be reported as added");
    }

    println!("🌐 Fetching {} region(s): {}", config.api.regions.len(), config.api.regions.join(", "));
    let new = fetch_catalog(client, &config.api.regions, pacing).await?;

    let captured_at = Utc::now();
    let diff = diff_catalogs(&old, &new, captured_at);
    debug!(
        "{} metadata changes, {} activity changes",
        diff.changes.len(),
        diff.activity_changed.len()
    );

    println!("\n📊 Sync Summary:");
    println!("   Parks: {} (was {})", new.len(), old.len());
    println!(
        "   Added: {} | Deleted: {} | Modified: {}",
        diff.count_tagged(PARK_ADDED),
        diff.count_tagged(PARK_DELETED),
        diff.changes.len() - diff.count_tagged(PARK_ADDED) - diff.count_tagged(PARK_DELETED)
    );
    println!("   Activity changed: {}", diff.activity_changed.len());
    if diff.is_empty() {
        println!("   No differences since the last snapshot.");
    }

    let mut report = SyncReport {
        parks: new.len(),
        diff,
        marker: None,
    };

    if dry_run {
        println!("\n✅ Dry run complete. Nothing was written.");
        return Ok(report);
    }

    store::write_json(&paths.changes, &report.diff.changes)?;
    println!("   Changes written to {}", paths.changes.display());

    if !report.diff.activity_changed.is_empty() {
        let marker = paths.marker_dir.join(marker_file_name(captured_at));
        store::write_lines(&marker, &report.diff.activity_changed)?;
        println!(
            "   {} references with activity updates written to {}",
            report.diff.activity_changed.len(),
            marker.display()
        );
        report.marker = Some(marker);
    }

    // The snapshot is the baseline for the next run, so it goes last.
    store::save_catalog(&paths.snapshot, &new)?;
    println!("\n✅ Snapshot updated: {}", paths.snapshot.display());

    Ok(report)
}
