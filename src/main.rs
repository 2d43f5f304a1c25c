//! pota-sync - rate-limited mirror of the POTA park catalog
//!
//! Keeps a local catalog snapshot in step with the upstream API, records
//! what changed between runs, and maintains per-mode (CW / SSB / DATA)
//! activity totals, without ever hammering the shared upstream.
//!
//! Exit codes:
//!   0 - Success (including "nothing to do")
//!   1 - Runtime error (bad arguments, config, fetch failure, I/O)

mod analysis;
mod api;
mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod references;
mod store;
mod throttle;

use anyhow::{Context, Result};
use api::PotaClient;
use cli::{Args, Command};
use commands::build_modes::BuildOptions;
use commands::update_modes::UpdateOptions;
use commands::Pacing;
use config::{Config, DEFAULT_CONFIG_FILE};
use std::path::Path;
use std::sync::Arc;
use throttle::SystemClock;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config(args.config.as_deref());
    }

    // Initialize logging
    init_logging(&args);

    info!("pota-sync v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: write the default configuration file.
fn handle_init_config(target: Option<&Path>) -> Result<()> {
    let path = target.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            path.display()
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Created {} with default settings.", path.display());
    println!("   Edit it to customize regions, request rate, retries, and file paths.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over the flags when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the selected subcommand.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    let show_progress = !args.quiet;

    match args.command {
        Command::Sync(ref sync) => {
            let (client, mut pacing) = connect(&config)?;
            commands::sync::run(&config, sync.dry_run, &client, &mut pacing).await?;
        }
        Command::BuildModes(ref build) => {
            let (client, mut pacing) = connect(&config)?;
            let options = BuildOptions {
                resume: build.resume,
                shuffle: build.shuffle,
                show_progress,
            };
            commands::build_modes::run(&config, &options, &client, &mut pacing).await?;
        }
        Command::UpdateModes(ref update) => {
            let (client, mut pacing) = connect(&config)?;
            let options = UpdateOptions {
                emit_latest: update.emit_latest.clone(),
                show_progress,
            };
            commands::update_modes::run(&config, &options, &client, &mut pacing).await?;
        }
        Command::ApplyModes(ref apply) => {
            commands::apply_modes::run(&config, apply.out.clone())?;
        }
        Command::InitConfig => {}
    }

    Ok(())
}

/// Build the HTTP client and the pacing layers for one run.
fn connect(config: &Config) -> Result<(PotaClient, Pacing)> {
    let client = PotaClient::new(&config.client_config())?;
    let pacing = Pacing::new(&config.throttle, Arc::new(SystemClock));

    info!("API: {}", config.api.base_url);
    info!(
        "Pacing: {:.2} req/s, up to {} retries, initial backoff {:.2}s",
        pacing.limiter.rate(),
        pacing.retry.policy().max_retries,
        pacing.retry.policy().backoff_initial.as_secs_f64()
    );
    Ok((client, pacing))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
