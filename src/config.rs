//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pota-sync.toml` files.

use crate::api::ClientConfig;
use crate::cli::{Args, Command, ThrottleArgs};
use crate::throttle::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".pota-sync.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Request pacing and retry settings.
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Batch run settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Rolling store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Default file locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Upstream API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the read API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Region partitions fetched by `sync`.
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            regions: default_regions(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.pota.app".to_string()
}

fn default_regions() -> Vec<String> {
    vec!["US", "CA", "GB", "NO", "IE"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("pota-sync/{}", env!("CARGO_PKG_VERSION"))
}

/// Pacing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Sustained requests per second.
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in seconds; doubles per retry.
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial: f64,

    /// Random spread applied to every wait, as a fraction (0.2 = ±20%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            max_retries: default_max_retries(),
            backoff_initial: default_backoff_initial(),
            jitter: default_jitter(),
        }
    }
}

fn default_rate() -> f64 {
    2.0
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_initial() -> f64 {
    0.75
}

fn default_jitter() -> f64 {
    crate::throttle::DEFAULT_JITTER
}

impl ThrottleConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_initial: Duration::from_secs_f64(self.backoff_initial.max(0.0)),
            jitter: self.jitter,
        }
    }
}

/// Batch run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Rows between checkpoint writes (0 = only the final write).
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    /// References between progress log lines.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: default_checkpoint_every(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_checkpoint_every() -> usize {
    500
}

fn default_progress_every() -> usize {
    50
}

/// Rolling store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Calendar days retained.
    #[serde(default = "default_days")]
    pub days: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
        }
    }
}

fn default_days() -> usize {
    crate::store::rolling::DEFAULT_DAYS
}

/// Default input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,

    #[serde(default = "default_changes")]
    pub changes: PathBuf,

    /// Directory receiving `updateQSO.<timestamp>` marker files.
    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,

    #[serde(default = "default_modes_base")]
    pub modes_base: PathBuf,

    #[serde(default = "default_mode_changes")]
    pub mode_changes: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot(),
            changes: default_changes(),
            marker_dir: default_marker_dir(),
            modes_base: default_modes_base(),
            mode_changes: default_mode_changes(),
        }
    }
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("allparks.json")
}

fn default_changes() -> PathBuf {
    PathBuf::from("changes.json")
}

fn default_marker_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_modes_base() -> PathBuf {
    PathBuf::from("modes-base.json")
}

fn default_mode_changes() -> PathBuf {
    PathBuf::from("mode-changes.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(throttle) = args.command.throttle() {
            self.merge_throttle(throttle);
        }

        match &args.command {
            Command::Sync(sync) => {
                if !sync.regions.is_empty() {
                    self.api.regions = sync.regions.clone();
                }
                override_path(&mut self.paths.snapshot, &sync.snapshot);
                override_path(&mut self.paths.changes, &sync.changes_out);
                override_path(&mut self.paths.marker_dir, &sync.marker_dir);
            }
            Command::BuildModes(build) => {
                override_path(&mut self.paths.snapshot, &build.snapshot);
                override_path(&mut self.paths.modes_base, &build.out);
                if let Some(every) = build.checkpoint_every {
                    self.batch.checkpoint_every = every;
                }
            }
            Command::UpdateModes(update) => {
                override_path(&mut self.paths.changes, &update.changes);
                override_path(&mut self.paths.mode_changes, &update.out);
                if let Some(days) = update.days {
                    self.store.days = days;
                }
            }
            Command::ApplyModes(apply) => {
                override_path(&mut self.paths.snapshot, &apply.snapshot);
                override_path(&mut self.paths.modes_base, &apply.modes);
            }
            Command::InitConfig => {}
        }
    }

    fn merge_throttle(&mut self, args: &ThrottleArgs) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(rate) = args.rate {
            self.throttle.rate = rate;
        }
        if let Some(max_retries) = args.max_retries {
            self.throttle.max_retries = max_retries;
        }
        if let Some(backoff) = args.backoff_initial {
            self.throttle.backoff_initial = backoff;
        }
        if let Some(jitter) = args.jitter {
            self.throttle.jitter = jitter;
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::from(&self.api)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn override_path(target: &mut PathBuf, value: &Option<PathBuf>) {
    if let Some(path) = value {
        *target = path.clone();
    }
}
