//! Background driver for reconciliation passes.
//!
//! # Architecture
//!
//! A single task owns every pass for one tracked root, so passes never
//! overlap. It runs a pass:
//!
//! - once at startup
//! - every `scan_interval`
//! - after an on-demand request, once `settle_delay` has passed
//!
//! On-demand requests go through a channel with room for one message.
//! [`ScanTrigger::request`] never blocks: if a request is already pending the
//! new one is dropped, which collapses a burst of filesystem events into a
//! single pass.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//! use wiki_history::store::HistoryStore;
//! use wiki_history::trigger::{HistoryRecorder, RecorderSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(HistoryStore::open_in_memory()?);
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let (trigger, handle) = HistoryRecorder::spawn(
//!         store,
//!         PathBuf::from("data"),
//!         RecorderSettings::default(),
//!         shutdown_rx,
//!     );
//!
//!     trigger.request();
//!
//!     shutdown_tx.send(true)?;
//!     handle.await?;
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::store::HistoryStore;

/// Default period of the background pass.
const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(300);

/// Default quiet period before an on-demand pass.
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Timing of the background recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderSettings {
    /// Period of the timer-driven pass.
    pub scan_interval: Duration,

    /// Wait between receiving a request and running its pass. Requests that
    /// arrive meanwhile are folded into the same pass.
    pub settle_delay: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Handle used to ask the recorder for a pass.
#[derive(Debug, Clone)]
pub struct ScanTrigger {
    tx: mpsc::Sender<()>,
}

impl ScanTrigger {
    /// Requests a pass without waiting.
    ///
    /// Returns `true` if the request was queued and `false` if one was
    /// already pending or the recorder has stopped.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Closed(())) => {
                debug!("Scan requested after recorder stopped");
                false
            }
        }
    }
}

/// Spawns and owns the pass-driving task.
pub struct HistoryRecorder;

impl HistoryRecorder {
    /// Starts the recorder for `root` on the current Tokio runtime.
    ///
    /// The task exits when `shutdown` turns `true` or its sender is dropped.
    /// A pass already running at that moment is allowed to finish.
    pub fn spawn(
        store: Arc<HistoryStore>,
        root: PathBuf,
        settings: RecorderSettings,
        shutdown: watch::Receiver<bool>,
    ) -> (ScanTrigger, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(drive(store, root, settings, rx, shutdown));
        (ScanTrigger { tx }, handle)
    }
}

async fn drive(
    store: Arc<HistoryStore>,
    root: PathBuf,
    settings: RecorderSettings,
    mut requests: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        root = %root.display(),
        scan_interval_secs = settings.scan_interval.as_secs_f64(),
        settle_ms = settings.settle_delay.as_millis() as u64,
        "History recorder started"
    );

    run_pass(&store, &root, "startup").await;

    let start = Instant::now() + settings.scan_interval;
    let mut ticker = interval_at(start, settings.scan_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                run_pass(&store, &root, "interval").await;
            }

            Some(()) = requests.recv() => {
                if !settings.settle_delay.is_zero() {
                    tokio::select! {
                        biased;
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                        () = tokio::time::sleep(settings.settle_delay) => {}
                    }
                }
                while requests.try_recv().is_ok() {}
                run_pass(&store, &root, "request").await;
            }
        }
    }

    info!(root = %root.display(), "History recorder stopped");
}

async fn run_pass(store: &Arc<HistoryStore>, root: &Path, reason: &'static str) {
    let store = Arc::clone(store);
    let task_root = root.to_path_buf();

    match tokio::task::spawn_blocking(move || store.capture_file_history(&task_root)).await {
        Ok(Ok(summary)) => {
            debug!(reason, changes = summary.total(), "History pass complete");
        }
        Ok(Err(e)) => {
            error!(reason, root = %root.display(), error = %e, "History pass failed");
        }
        Err(e) => {
            error!(reason, root = %root.display(), error = %e, "History pass task failed");
        }
    }
}
