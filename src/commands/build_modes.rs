//! `build-modes`: mode totals for every park in the snapshot.

use super::{batch_options, Pacing};
use crate::api::PotaClient;
use crate::batch::{BatchProcessor, JsonFileSink};
use crate::config::Config;
use crate::models::ModeRow;
use crate::references::load_references;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Keep rows already present in the output and skip their parks.
    pub resume: bool,
    pub shuffle: bool,
    pub show_progress: bool,
}

pub async fn run(
    config: &Config,
    options: &BuildOptions,
    client: &PotaClient,
    pacing: &mut Pacing,
) -> Result<Vec<ModeRow>> {
    let start_time = Instant::now();

    let references = load_references(&config.paths.snapshot).with_context(|| {
        format!(
            "Cannot read park list from {} (run `pota-sync sync` first?)",
            config.paths.snapshot.display()
        )
    })?;
    info!("{} parks in {}", references.len(), config.paths.snapshot.display());

    let mut sink = JsonFileSink::new(&config.paths.modes_base);
    let prior = if options.resume {
        sink.load()?
    } else {
        Vec::new()
    };

    println!(
        "🔬 Building mode totals for {} parks → {}",
        references.len(),
        sink.path().display()
    );

    let rows = BatchProcessor::new(
        &mut pacing.limiter,
        &pacing.retry,
        batch_options(config, options.shuffle, options.show_progress),
    )
    .run(
        &references,
        prior,
        move |reference: String| async move { client.fetch_activations(&reference).await },
        &mut sink,
    )
    .await?;

    println!(
        "\n✅ Wrote {} entries to {} in {:.1}s",
        rows.len(),
        sink.path().display(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use crate::models::ModeTotals;
    use crate::store;
    use serde_json::json;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.snapshot = dir.path().join("allparks.json");
        config.paths.modes_base = dir.path().join("modes-base.json");
        config
    }

    fn activations(cw: u64, ssb: u64, ft8: u64) -> String {
        json!([
            {"mode": "CW", "qsos": cw},
            {"mode": "SSB", "qsos": ssb},
            {"mode": "FT8", "qsos": ft8}
        ])
        .to_string()
    }

    #[tokio::test]
    async fn test_builds_rows_in_snapshot_order() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(
            &config.paths.snapshot,
            json!([{"reference": "US-0001"}, {"reference": "US-0002"}]).to_string(),
        )
        .unwrap();

        let base = testing::serve_routes(vec![
            ("/park/activations/US-0001?count=all", 200, activations(1, 2, 3)),
            (
                "/park/activations/US-0002?count=all",
                200,
                json!({"modeTotals": {"cw": 4, "ssb": "5", "data": 6}}).to_string(),
            ),
        ])
        .await;

        let rows = run(
            &config,
            &BuildOptions::default(),
            &testing::client(&base),
            &mut testing::pacing(),
        )
        .await
        .unwrap();

        let expected = vec![
            ModeRow::new("US-0001", ModeTotals::new(1, 2, 3)),
            ModeRow::new("US-0002", ModeTotals::new(4, 5, 6)),
        ];
        assert_eq!(rows, expected);
        let written: Vec<ModeRow> = store::read_json(&config.paths.modes_base).unwrap();
        assert_eq!(written, expected);
    }

    #[tokio::test]
    async fn test_resume_keeps_prior_rows() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(
            &config.paths.snapshot,
            json!([{"reference": "A-1"}, {"reference": "A-2"}]).to_string(),
        )
        .unwrap();
        let prior = vec![ModeRow::new("A-1", ModeTotals::new(9, 9, 9))];
        store::write_json(&config.paths.modes_base, &prior).unwrap();

        // Only A-2 is served; fetching A-1 again would 404 and fail the run.
        let base = testing::serve_routes(vec![(
            "/park/activations/A-2?count=all",
            200,
            activations(0, 1, 0),
        )])
        .await;

        let options = BuildOptions {
            resume: true,
            ..BuildOptions::default()
        };
        let rows = run(&config, &options, &testing::client(&base), &mut testing::pacing())
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                ModeRow::new("A-1", ModeTotals::new(9, 9, 9)),
                ModeRow::new("A-2", ModeTotals::new(0, 1, 0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_snapshot_fails() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let base = testing::serve_routes(Vec::new()).await;

        let result = run(
            &config,
            &BuildOptions::default(),
            &testing::client(&base),
            &mut testing::pacing(),
        )
        .await;
        assert!(result.is_err());
        assert!(!config.paths.modes_base.exists());
    }

    #[tokio::test]
    async fn test_client_error_keeps_completed_prefix() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(
            &config.paths.snapshot,
            json!(["B-1", "B-2", "B-3"]).to_string(),
        )
        .unwrap();
        let base = testing::serve_routes(vec![(
            "/park/activations/B-1?count=all",
            200,
            activations(1, 0, 0),
        )])
        .await;

        let result = run(
            &config,
            &BuildOptions::default(),
            &testing::client(&base),
            &mut testing::pacing(),
        )
        .await;

        assert!(result.is_err());
        let saved: Vec<ModeRow> = store::read_json(&config.paths.modes_base).unwrap();
        assert_eq!(saved, vec![ModeRow::new("B-1", ModeTotals::new(1, 0, 0))]);
    }
}
