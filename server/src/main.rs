//! Wiki Server - Main entry point.
//!
//! This binary starts the wiki history server with:
//! - Structured JSON logging for production
//! - The background history recorder and, optionally, a filesystem watcher
//! - Graceful shutdown handling (SIGTERM/SIGINT)
//!
//! # Configuration
//!
//! See [`wiki_server::config`] for environment variable configuration.
//!
//! # Example
//!
//! ```bash
//! WIKI_DATA_DIR=./data \
//! WIKI_HISTORY_DB=./data/.history.db \
//! PORT=8080 \
//! cargo run --release --bin wiki-server
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use wiki_history::store::HistoryStore;
use wiki_history::trigger::HistoryRecorder;
use wiki_history::watcher::HistoryWatcher;
use wiki_server::config::Config;
use wiki_server::routes::{create_router, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            eprintln!("Error: {err}");
            eprintln!();
            eprintln!("Optional environment variables:");
            eprintln!("  PORT                             - HTTP server port (default: 8080)");
            eprintln!("  WIKI_DATA_DIR                    - Tracked directory (default: ./data)");
            eprintln!("  WIKI_HISTORY_DB                  - SQLite database path");
            eprintln!("  WIKI_HISTORY_SCAN_INTERVAL_SECS  - Seconds between passes (default: 300)");
            eprintln!("  WIKI_HISTORY_SETTLE_MS           - Delay before a requested pass (default: 500)");
            eprintln!("  WIKI_HISTORY_WATCH               - Watch for file changes (default: true)");
            eprintln!("  RUST_LOG                         - Log level filter (default: info)");
            return ExitCode::from(1);
        }
    };

    info!(
        port = config.port,
        data_dir = %config.history.data_dir.display(),
        db_path = %config.history.db_path.display(),
        scan_interval_secs = config.history.scan_interval.as_secs(),
        watch_enabled = config.history.watch_enabled,
        "Wiki server starting"
    );

    let store = match HistoryStore::open(&config.history.db_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(
                error = %err,
                db_path = %config.history.db_path.display(),
                "Failed to open history store"
            );
            return ExitCode::from(1);
        }
    };

    if let Err(err) = std::fs::create_dir_all(&config.history.data_dir) {
        warn!(
            error = %err,
            data_dir = %config.history.data_dir.display(),
            "Failed to create data directory"
        );
    }

    // Start the recorder
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (trigger, recorder) = HistoryRecorder::spawn(
        Arc::clone(&store),
        config.history.data_dir.clone(),
        config.history.recorder_settings(),
        shutdown_rx,
    );

    let _watcher = if config.history.watch_enabled {
        match HistoryWatcher::new(config.history.data_dir.clone(), trigger.clone()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(error = %err, "File watcher unavailable, relying on periodic passes");
                None
            }
        }
    } else {
        None
    };

    let state = AppState::new(config.clone(), store, trigger);
    let app = create_router(state);

    // Bind to address
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => {
            info!(port = config.port, address = %bind_addr, "Server listening");
            listener
        }
        Err(err) => {
            error!(error = %err, address = %bind_addr, "Failed to bind to address");
            return ExitCode::from(1);
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    info!("Server ready to accept connections");

    let mut exit = ExitCode::SUCCESS;
    if let Err(err) = server.await {
        error!(error = %err, "Server error");
        exit = ExitCode::from(1);
    }

    info!("Server shutting down gracefully");

    // A pass in flight finishes before the recorder exits.
    let _ = shutdown_tx.send(true);
    if let Err(err) = recorder.await {
        error!(error = %err, "History recorder task failed");
    }

    info!("Server shutdown complete");
    exit
}

/// Initialize structured logging with tracing.
///
/// JSON output, filtered by `RUST_LOG` (default `info`).
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,axum::rejection=trace"));

    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .init();
}

/// Resolves when SIGTERM or SIGINT is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
