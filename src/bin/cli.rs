//! Transcript Sync CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use transcript_sync::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, Stores},
    services::read_grid,
    storage::{DryRunStore, NotionStore, RecordStore},
};

/// transcript-sync - Academic transcript reconciler
#[derive(Parser, Debug)]
#[command(
    name = "transcript-sync",
    version,
    about = "Reconciles a scraped academic transcript with Notion tables"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// API token, overrides remote.token from the config file
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile a transcript with every configured table
    Sync {
        /// Transcript grid as JSON rows, or a saved portal page (.html)
        #[arg(short, long)]
        input: PathBuf,

        /// Read remote tables but log writes instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print normalized records as JSON without touching the remote store
    Normalize {
        /// Transcript grid as JSON rows, or a saved portal page (.html)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check that the remote store accepts the configured token
    Check,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Open a remote table, wrapped so writes are only logged on dry runs.
fn open_store(config: &Config, table: &str, dry_run: bool) -> Result<Box<dyn RecordStore>> {
    let store = NotionStore::new(config, table)?;
    if dry_run {
        Ok(Box::new(DryRunStore::new(store)))
    } else {
        Ok(Box::new(store))
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Transcript sync starting...");

    let mut config = Config::load_or_default(&cli.config);
    if let Some(token) = cli.token {
        config.remote.token = token;
    }

    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Sync { input, dry_run } => {
            config.validate_remote()?;
            if dry_run {
                log::warn!("Dry run: remote tables will be read but not modified");
            }

            let grid = read_grid(&input, &config.table)?;
            log::info!("Read {} grid rows from {}", grid.len(), input.display());

            let main = open_store(&config, &config.tables.main, dry_run)?;
            let rejected = open_store(&config, &config.tables.rejected, dry_run)?;
            let timeline = match &config.tables.timeline {
                Some(table) => Some(open_store(&config, table, dry_run)?),
                None => {
                    log::info!("No timeline table configured, skipping timeline pass");
                    None
                }
            };

            let stores = Stores {
                main: main.as_ref(),
                rejected: rejected.as_ref(),
                timeline: timeline.as_deref(),
            };
            let report = pipeline::run_sync(&config, &grid, &stores).await?;

            if report.is_clean() {
                log::info!("Sync complete!");
            } else {
                log::warn!("Sync finished with failures, see the summary above");
            }
        }

        Command::Normalize { input } => {
            config.validate()?;
            let grid = read_grid(&input, &config.table)?;
            let records = pipeline::prepare_records(&config, &grid)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        Command::Check => {
            config.validate_remote()?;
            let store = NotionStore::new(&config, &config.tables.main)?;
            let status = store.check_connection().await?;
            if !(200..300).contains(&status) {
                log::error!("Remote store answered with status {}", status);
                return Err(AppError::RemoteStatus {
                    status,
                    body: "connection check failed".into(),
                });
            }
            log::info!("✓ Remote store reachable (status {})", status);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            if let Err(e) = config.validate_remote() {
                log::warn!("Remote settings incomplete: {}", e);
            }
            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
