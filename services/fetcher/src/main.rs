//! Raw forcing input fetcher.
//!
//! One run per invocation, meant to be driven by cron:
//! - Takes a PID lock file and exits quietly if another run holds it
//! - Removes cycle directories that have aged out of the lookback window
//! - Downloads every missing file of the recent cycles, skipping failures

mod config;
mod fetch;
mod lock;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::FetchConfig;
use fetch::Fetcher;
use lock::{LockFile, LockOutcome};

#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(about = "Fetch recent forecast cycles and clean out old ones")]
struct Args {
    /// Fetch configuration file
    #[arg(short, long, env = "FETCH_CONFIG", default_value = "config/arw_puerto_rico.yaml")]
    config: PathBuf,

    /// Treat this time as "now" (RFC 3339 or YYYYMMDDHHMM)
    #[arg(long)]
    now: Option<String>,

    /// Skip removal of old cycle directories
    #[arg(long)]
    no_clean: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = FetchConfig::load(&args.config)?;
    let now: DateTime<Utc> = match &args.now {
        Some(s) => forcing_engine::parse_time(s)
            .with_context(|| format!("Invalid --now value: {}", s))?,
        None => Utc::now(),
    };

    info!(source = %config.source.name, now = %now, "Starting fetch");

    let lock = match LockFile::acquire(&config.lock_file)? {
        LockOutcome::Acquired(lock) => lock,
        LockOutcome::Held { pid } => {
            warn!(
                lock = %config.lock_file.display(),
                pid = %pid,
                "Fetch already running, exiting"
            );
            return Ok(());
        }
    };

    let fetcher = Fetcher::new(config)?;
    info!(
        lock = %lock.path().display(),
        output_dir = %fetcher.config().output_dir.display(),
        "Lock acquired"
    );

    if !args.no_clean {
        let removed = fetcher.clean(now).await?;
        info!(removed = removed, "Cleanup complete");
    }

    let report = fetcher.download_window(now).await?;
    info!(
        downloaded = report.downloaded,
        already_present = report.already_present,
        failed = report.failed,
        "Fetch complete"
    );

    drop(lock);
    Ok(())
}
