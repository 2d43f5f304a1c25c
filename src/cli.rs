//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pota-sync - polite mirror of the POTA park catalog
///
/// Keeps a local snapshot of the park catalog in step with the upstream API,
/// records what changed between runs, and maintains per-mode (CW / SSB /
/// DATA) activity totals. Every request is paced and retried with backoff.
///
/// Examples:
///   pota-sync sync
///   pota-sync sync --region US --region CA --dry-run
///   pota-sync build-modes --resume --shuffle
///   pota-sync update-modes --changes updateQSO.20240101T000000Z --emit-latest latest.json
///   pota-sync apply-modes --modes mode-changes.json
///   pota-sync init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .pota-sync.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bar)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch the catalog, diff it against the snapshot and record changes
    Sync(SyncArgs),

    /// Build mode totals for every park in the snapshot (resumable)
    BuildModes(BuildModesArgs),

    /// Refresh mode totals for changed parks into the rolling store
    UpdateModes(UpdateModesArgs),

    /// Write mode totals back into a catalog snapshot
    ApplyModes(ApplyModesArgs),

    /// Generate a default .pota-sync.toml configuration file
    InitConfig,
}

/// Pacing and retry overrides shared by every command that talks to the API.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ThrottleArgs {
    /// Sustained requests per second
    #[arg(long, value_name = "PER_SEC", env = "POTA_SYNC_RATE")]
    pub rate: Option<f64>,

    /// Retries per request after the first attempt
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// First retry delay in seconds (doubles per retry)
    #[arg(long, value_name = "SECS")]
    pub backoff_initial: Option<f64>,

    /// Random spread applied to every wait, as a fraction (0.0 - 1.0)
    #[arg(long, value_name = "FRACTION")]
    pub jitter: Option<f64>,

    /// Base URL of the upstream API
    #[arg(long, value_name = "URL", env = "POTA_SYNC_API_URL")]
    pub api_url: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Catalog snapshot used as the baseline and overwritten afterwards
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Where to write the change log
    #[arg(long, value_name = "FILE")]
    pub changes_out: Option<PathBuf>,

    /// Directory for updateQSO.<timestamp> marker files
    #[arg(long, value_name = "DIR")]
    pub marker_dir: Option<PathBuf>,

    /// Region to fetch (repeatable; replaces the configured list)
    #[arg(long = "region", value_name = "CODE")]
    pub regions: Vec<String>,

    /// Fetch and diff, report, but write nothing
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub throttle: ThrottleArgs,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildModesArgs {
    /// Catalog snapshot providing the park list
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Output file for the mode totals (also the checkpoint)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Continue from the rows already in the output file
    #[arg(long)]
    pub resume: bool,

    /// Rows between checkpoint writes (0 = only at the end)
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,

    /// Process remaining parks in random order
    #[arg(long)]
    pub shuffle: bool,

    #[command(flatten)]
    pub throttle: ThrottleArgs,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct UpdateModesArgs {
    /// Changed parks: a change log, snapshot, or updateQSO marker file
    #[arg(long, value_name = "FILE")]
    pub changes: Option<PathBuf>,

    /// Rolling mode-change store
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Calendar days kept in the store
    #[arg(long, value_name = "N")]
    pub days: Option<usize>,

    /// Also write the latest totals per park to this file
    #[arg(long, value_name = "FILE")]
    pub emit_latest: Option<PathBuf>,

    #[command(flatten)]
    pub throttle: ThrottleArgs,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ApplyModesArgs {
    /// Catalog snapshot to update
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Mode totals: a flat row list or a rolling store
    #[arg(long, value_name = "FILE")]
    pub modes: Option<PathBuf>,

    /// Output file (defaults to the snapshot itself)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

impl Command {
    /// Throttle overrides, for commands that fetch.
    pub fn throttle(&self) -> Option<&ThrottleArgs> {
        match self {
            Command::Sync(args) => Some(&args.throttle),
            Command::BuildModes(args) => Some(&args.throttle),
            Command::UpdateModes(args) => Some(&args.throttle),
            Command::ApplyModes(_) | Command::InitConfig => None,
        }
    }
}

impl ThrottleArgs {
    fn validate(&self) -> Result<(), String> {
        if let Some(rate) = self.rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err("Rate must be a non-negative number".to_string());
            }
        }

        if let Some(backoff) = self.backoff_initial {
            if !backoff.is_finite() || backoff < 0.0 {
                return Err("Initial backoff must be a non-negative number of seconds".to_string());
            }
        }

        if let Some(jitter) = self.jitter {
            if !(0.0..=1.0).contains(&jitter) {
                return Err("Jitter must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        Ok(())
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(throttle) = self.command.throttle() {
            throttle.validate()?;
        }

        if let Command::Sync(ref sync) = self.command {
            if sync.regions.iter().any(|r| r.trim().is_empty()) {
                return Err("Region codes must not be empty".to_string());
            }
        }

        if let Command::UpdateModes(ref update) = self.command {
            if update.days == Some(0) {
                return Err("Days must be at least 1".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
