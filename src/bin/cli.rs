//! jobsync CLI
//!
//! Polls the job feed on a schedule and pushes changes to the job board.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jobsync::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, SyncPipeline},
    storage::{LocalStorage, MemoryStorage, SyncStore},
};
use tokio::sync::Mutex;

/// jobsync - Job Feed to Job Board Sync
#[derive(Parser, Debug)]
#[command(name = "jobsync", version, about = "Job Feed to Job Board Sync")]
struct Cli {
    /// Path to storage directory containing config and state files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the feed on the configured schedule until interrupted
    Run {
        /// Run one cycle right away instead of waiting for the first trigger
        #[arg(long)]
        immediate: bool,
    },

    /// Run a single sync cycle and exit
    Once,

    /// Validate configuration file
    Validate,

    /// Show persisted state info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Pick the state backend for the configuration.
fn open_store(storage_dir: &Path, config: &Config) -> Arc<dyn SyncStore> {
    if config.storage.persist {
        Arc::new(LocalStorage::new(storage_dir, &config.storage.state_file))
    } else {
        Arc::new(MemoryStorage::new())
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("jobsync starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = match Config::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Config load failed from {}: {}", config_path.display(), e);
            return Err(e);
        }
    };

    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    match cli.command {
        Command::Run { immediate } => {
            config.validate()?;
            let store = open_store(&cli.storage_dir, &config);
            let pipeline = Arc::new(SyncPipeline::from_config(&config, store)?);
            let state = Arc::new(Mutex::new(pipeline.store().load_state().await?));

            log::info!("Feed: {}", config.feed.url);
            log::info!("Job board: {}", config.api.base_url);

            if immediate {
                if let Err(e) = pipeline::run_guarded(&pipeline, &state).await {
                    log::error!("Sync cycle failed: {}", e);
                }
            }

            let mut scheduler = pipeline::start_scheduler(
                Arc::clone(&pipeline),
                Arc::clone(&state),
                &config.schedule.cron,
            )
            .await?;

            tokio::signal::ctrl_c().await?;
            log::info!("Shutting down scheduler...");
            scheduler.shutdown().await.map_err(AppError::scheduler)?;
        }

        Command::Once => {
            config.validate()?;
            let store = open_store(&cli.storage_dir, &config);
            let pipeline = SyncPipeline::from_config(&config, store)?;
            let mut state = pipeline.store().load_state().await?;

            let report = pipeline.run_cycle(&mut state).await?;
            if report.fetched {
                log::info!(
                    "Changes: {} new, {} updated, {} stopped",
                    report.changes.new,
                    report.changes.updated,
                    report.changes.stopped
                );
                log::info!(
                    "Delivered {} ({} retried), {} rejected, {} expired, {} pending",
                    report.delivered,
                    report.retried,
                    report.rejected,
                    report.expired,
                    report.pending
                );
            } else {
                log::warn!("Feed unavailable, nothing synced");
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            pipeline::normalize_cron(&config.schedule.cron)?;

            log::info!("✓ Config OK");
            log::info!("  feed.url: {}", config.feed.url);
            log::info!("  api.base_url: {}", config.api.base_url);
            log::info!("  schedule.cron: {}", config.schedule.cron);
            log::info!(
                "  storage: {}",
                if config.storage.persist {
                    "persistent"
                } else {
                    "memory only"
                }
            );
        }

        Command::Info => {
            let storage = LocalStorage::new(&cli.storage_dir, &config.storage.state_file);
            log::info!("Storage directory: {}", cli.storage_dir.display());

            if !storage.state_path().exists() {
                log::info!("No persisted state found yet.");
            } else {
                let state = storage.load_state().await?;
                log::info!("Known jobs: {}", state.snapshot.len());
                log::info!("Pending changes: {}", state.pending.len());
                match state.updated_at {
                    Some(updated) => log::info!("Last updated: {}", updated),
                    None => log::info!("Last updated: never"),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
