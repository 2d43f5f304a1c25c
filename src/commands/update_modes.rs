//! `update-modes`: refresh mode totals for changed parks into the rolling store.

use super::{batch_options, Pacing};
use crate::api::PotaClient;
use crate::batch::{BatchProcessor, NoCheckpoint};
use crate::config::Config;
use crate::references::load_references;
use crate::store::{self, ModeChangeStore};
use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Also write the flattened latest view here.
    pub emit_latest: Option<PathBuf>,
    pub show_progress: bool,
}

/// Returns the updated store, or `None` when there was nothing to refresh.
pub async fn run(
    config: &Config,
    options: &UpdateOptions,
    client: &PotaClient,
    pacing: &mut Pacing,
) -> Result<Option<ModeChangeStore>> {
    let references = load_references(&config.paths.changes)?;
    if references.is_empty() {
        println!("No changed parks found; nothing to do.");
        return Ok(None);
    }

    println!(
        "🔬 Refreshing mode totals for {} changed parks",
        references.len()
    );

    // The store is only rewritten once the whole batch has succeeded.
    let mut options_for_batch = batch_options(config, false, options.show_progress);
    options_for_batch.checkpoint_every = 0;

    let rows = BatchProcessor::new(&mut pacing.limiter, &pacing.retry, options_for_batch)
        .run(
            &references,
            Vec::new(),
            move |reference: String| async move { client.fetch_activations(&reference).await },
            &mut NoCheckpoint,
        )
        .await?;
    let fetched = rows.len();

    let out = &config.paths.mode_changes;
    let mut change_store: ModeChangeStore = store::read_json_opt(out)?.unwrap_or_default();
    change_store.merge_batch(Utc::now().date_naive(), rows, config.store.days);
    store::write_json(out, &change_store)?;
    debug!("Retained days: {}", change_store.dates().join(", "));
    println!(
        "\n✅ Wrote {} changes into {} (keeping {} day-batches)",
        fetched,
        out.display(),
        change_store.batches.len()
    );

    if let Some(ref path) = options.emit_latest {
        let latest = change_store.latest();
        store::write_json(path, &latest)?;
        println!("   Wrote {} rows to {}", latest.len(), path.display());
    }

    Ok(Some(change_store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use crate::models::{ModeRow, ModeTotals};
    use crate::store::rolling::ChangeBatch;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.changes = dir.path().join("changes.json");
        config.paths.mode_changes = dir.path().join("mode-changes.json");
        config
    }

    fn today() -> String {
        Utc::now().date_naive().format("%Y-%m-%d").to_string()
    }

    #[tokio::test]
    async fn test_empty_change_list_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.paths.changes, "[]").unwrap();
        let base = testing::serve_routes(Vec::new()).await;

        let result = run(
            &config,
            &UpdateOptions::default(),
            &testing::client(&base),
            &mut testing::pacing(),
        )
        .await;

        assert!(assert_ok!(result).is_none());
        assert!(!config.paths.mode_changes.exists());
    }

    #[tokio::test]
    async fn test_merges_into_existing_store_and_emits_latest() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let marker = dir.path().join("updateQSO.20240101T000000Z");
        std::fs::write(&marker, "GB-0001\nGB-0002\n").unwrap();

        let older = ModeChangeStore {
            batches: vec![ChangeBatch {
                date: "2000-01-01".to_string(),
                changes: vec![
                    ModeRow::new("GB-0001", ModeTotals::new(1, 1, 1)),
                    ModeRow::new("GB-0009", ModeTotals::new(5, 0, 0)),
                ],
            }],
        };
        store::write_json(&config.paths.mode_changes, &older).unwrap();

        let base = testing::serve_routes(vec![
            (
                "/park/activations/GB-0001?count=all",
                200,
                json!([{"qsosCW": 2, "qsosPHONE": 3, "qsosDATA": 4}]).to_string(),
            ),
            ("/park/activations/GB-0002?count=all", 200, "[]".to_string()),
        ])
        .await;

        let mut config = config;
        config.paths.changes = marker;
        let latest_path = dir.path().join("latest.json");
        let options = UpdateOptions {
            emit_latest: Some(latest_path.clone()),
            show_progress: false,
        };

        let updated = run(&config, &options, &testing::client(&base), &mut testing::pacing())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.dates(), vec![today().as_str(), "2000-01-01"]);
        let on_disk: ModeChangeStore = store::read_json(&config.paths.mode_changes).unwrap();
        assert_eq!(on_disk, updated);

        let latest: Vec<ModeRow> = store::read_json(&latest_path).unwrap();
        assert_eq!(
            latest,
            vec![
                ModeRow::new("GB-0001", ModeTotals::new(2, 3, 4)),
                ModeRow::new("GB-0002", ModeTotals::default()),
                ModeRow::new("GB-0009", ModeTotals::new(5, 0, 0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.paths.changes, r#"["CA-0001"]"#).unwrap();
        let base = testing::serve_routes(vec![(
            "/park/activations/CA-0001?count=all",
            500,
            String::new(),
        )])
        .await;

        let result = run(
            &config,
            &UpdateOptions::default(),
            &testing::client(&base),
            &mut testing::pacing(),
        )
        .await;

        assert!(result.is_err());
        assert!(!config.paths.mode_changes.exists());
    }

    #[tokio::test]
    async fn test_missing_changes_file_fails() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let base = testing::serve_routes(Vec::new()).await;

        let result = run(
            &config,
            &UpdateOptions::default(),
            &testing::client(&base),
            &mut testing::pacing(),
        )
        .await;
        assert!(result.is_err());
    }
}
