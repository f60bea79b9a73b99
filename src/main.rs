//! ProcEnergy Tracker - Main entry point
//!
//! Polls a per-process energy snapshot file and prints the sorted table of
//! the latest sample after every successful cycle.

use anyhow::Context;
use clap::Parser;
use procenergy_tracker_lib::core::{Config, PollStatus};
use procenergy_tracker_lib::monitor::EnergyMonitor;
use procenergy_tracker_lib::provider::FileSource;
use procenergy_tracker_lib::table;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "procenergy-tracker", version, about = "Per-process energy collector")]
struct Cli {
    /// Config file (default: <config dir>/procenergy-tracker/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Snapshot file to read, overrides source.locator
    #[arg(long)]
    source: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Number of timeline points to retain
    #[arg(long)]
    max_points: Option<usize>,

    /// Fetch a single snapshot, print it and exit
    #[arg(long)]
    once: bool,

    /// Print JSON instead of a text table
    #[arg(long)]
    json: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    if let Some(source) = &cli.source {
        config.source.locator = source.clone();
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.general.poll_interval_ms = interval_ms;
    }
    if let Some(max_points) = cli.max_points {
        config.general.max_points = max_points;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting ProcEnergy Tracker v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let provider = Arc::new(FileSource::new(&config.source.locator));
    let monitor = Arc::new(EnergyMonitor::new(provider, &config));

    if cli.once {
        return print_once(&monitor, cli.json).await;
    }

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || token.cancel()).context("failed to install Ctrl+C handler")?;

    let mut status_rx = monitor.subscribe();
    let runner = Arc::clone(&monitor);
    let poller = tokio::spawn(async move { runner.run(cancel).await });

    while status_rx.changed().await.is_ok() {
        let status = status_rx.borrow_and_update().clone();
        match status {
            PollStatus::Stopped => break,
            PollStatus::Ok { .. } => {
                let view = monitor.dashboard().await;
                if cli.json {
                    println!("{}", serde_json::to_string(&view)?);
                } else {
                    println!("{}", status);
                    print!("{}", table::render_table(&view.rows, config.display.row_limit));
                }
            }
            PollStatus::Failed { .. } | PollStatus::Waiting => {
                if cli.json {
                    println!("{}", serde_json::to_string(&status)?);
                }
            }
        }
    }

    poller.await.context("poll task panicked")?;
    Ok(())
}

/// Single fetch in the snapshot delivery format
async fn print_once(monitor: &EnergyMonitor, json: bool) -> anyhow::Result<()> {
    match monitor.fetch().await {
        Ok(snapshot) if json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        Ok(snapshot) => print!("{}", table::render_table(&table::project(&snapshot), 0)),
        Err(failure) if json => println!("{}", serde_json::to_string_pretty(&failure)?),
        Err(failure) => {
            if let Some(raw) = &failure.raw_text {
                log::info!("Source text was:\n{}", raw);
            }
            anyhow::bail!("{}", failure);
        }
    }
    Ok(())
}
