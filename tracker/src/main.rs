//! Wiki History - command line front end for the page history tracker.
//!
//! # Commands
//!
//! - `wiki-history scan`: Run one reconciliation pass and print what changed
//! - `wiki-history history <path>`: Print the history of one page
//! - `wiki-history watch`: Record history continuously until interrupted
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wiki_history::config::Config;
use wiki_history::store::HistoryStore;
use wiki_history::trigger::HistoryRecorder;
use wiki_history::types::{FileHistoryEntry, HistoryStatus};
use wiki_history::watcher::HistoryWatcher;

/// Wiki History - page history tracker.
///
/// Snapshots the Markdown files of a wiki into an append-only SQLite log and
/// answers history queries that follow pages across renames.
#[derive(Parser, Debug)]
#[command(name = "wiki-history")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    WIKI_DATA_DIR                    Tracked directory (default: ./data)
    WIKI_HISTORY_DB                  SQLite database (default: platform data dir)
    WIKI_HISTORY_SCAN_INTERVAL_SECS  Seconds between passes (default: 300)
    WIKI_HISTORY_SETTLE_MS           Delay before a requested pass (default: 500)
    WIKI_HISTORY_WATCH               Watch for file changes (default: true)

EXAMPLES:
    # Record changes since the last pass
    wiki-history scan

    # Show the history of a page by route
    wiki-history history docs/setup

    # Keep recording until Ctrl+C
    wiki-history watch
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run one reconciliation pass.
    Scan,

    /// Print the history of a page, newest first.
    ///
    /// Accepts a file path (`docs/setup.md`) or a route (`/docs/setup`).
    History {
        /// Page path or route.
        path: String,

        /// Print the history as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record history continuously.
    ///
    /// Runs a pass at startup, on a timer, and after file changes.
    Watch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    let store = HistoryStore::open(&config.db_path).context(format!(
        "Failed to open history database at {}",
        config.db_path.display()
    ))?;

    match cli.command {
        Command::Scan => run_scan(&store, &config.data_dir),
        Command::History { path, json } => run_history(&store, &path, json),
        Command::Watch => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_watch(config, store))
        }
    }
}

/// Runs a single pass and prints the summary.
fn run_scan(store: &HistoryStore, root: &Path) -> Result<()> {
    let summary = store
        .capture_file_history(root)
        .context("History pass failed")?;

    println!(
        "created: {}, modified: {}, moved: {}, deleted: {}",
        summary.created, summary.modified, summary.moved, summary.deleted
    );
    Ok(())
}

/// Prints the history of one page.
fn run_history(store: &HistoryStore, path: &str, json: bool) -> Result<()> {
    let page = store
        .page_history(path)
        .context(format!("Failed to load history for '{path}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.history.is_empty() {
        println!("No history for '{path}'");
        return Ok(());
    }

    for entry in &page.history {
        let current = page.current_hash.as_deref() == Some(entry.hash.as_str())
            && entry.status != HistoryStatus::Deleted;
        println!("{}", format_entry(entry, current));
    }
    Ok(())
}

fn format_entry(entry: &FileHistoryEntry, current: bool) -> String {
    let marker = if current { "*" } else { " " };
    let short_hash = entry.hash.get(..12).unwrap_or(&entry.hash);
    let mut line = format!(
        "{marker} #{:<5} {}  {:<8} {}  {}",
        entry.id,
        entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        entry.status,
        short_hash,
        entry.path,
    );
    if let Some(previous) = &entry.previous_path {
        line.push_str(&format!(" (from {previous})"));
    }
    line
}

/// Runs the recorder and, if enabled, the watcher until a shutdown signal.
async fn run_watch(config: Config, store: HistoryStore) -> Result<()> {
    info!(
        data_dir = %config.data_dir.display(),
        db_path = %store.location(),
        scan_interval_secs = config.scan_interval.as_secs(),
        watch_enabled = config.watch_enabled,
        "Starting history recorder"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (trigger, recorder) = HistoryRecorder::spawn(
        Arc::new(store),
        config.data_dir.clone(),
        config.recorder_settings(),
        shutdown_rx,
    );

    let _watcher = if config.watch_enabled {
        match HistoryWatcher::new(config.data_dir.clone(), trigger) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "File watcher unavailable, relying on periodic passes");
                None
            }
        }
    } else {
        None
    };

    info!("Recorder running. Press Ctrl+C to stop.");
    wait_for_shutdown().await;
    info!("Shutdown signal received");

    // The pass in flight, if any, finishes before the recorder exits.
    let _ = shutdown_tx.send(true);
    recorder.await.context("History recorder task failed")?;

    info!("Recorder stopped");
    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
