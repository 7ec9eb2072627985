//! Filesystem watcher that requests history passes.
//!
//! The watcher does no reconciliation of its own. Any event that may have
//! changed the set of tracked files calls [`ScanTrigger::request`], and the
//! recorder's single-slot queue folds bursts of events into one pass.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//! use wiki_history::store::HistoryStore;
//! use wiki_history::trigger::{HistoryRecorder, RecorderSettings};
//! use wiki_history::watcher::HistoryWatcher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = PathBuf::from("data");
//!     let store = Arc::new(HistoryStore::open_in_memory()?);
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let (trigger, _handle) =
//!         HistoryRecorder::spawn(store, root.clone(), RecorderSettings::default(), shutdown_rx);
//!
//!     let _watcher = HistoryWatcher::new(root, trigger)?;
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::scanner::is_tracked_file;
use crate::trigger::ScanTrigger;

/// Errors that can occur while setting up the watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The watch directory does not exist or is inaccessible.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Recursive watch over the tracked root.
///
/// Dropping the watcher ends the subscription.
#[derive(Debug)]
pub struct HistoryWatcher {
    /// Kept alive to maintain the watch subscription.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,

    watch_dir: PathBuf,
}

impl HistoryWatcher {
    /// Starts watching `watch_dir` and every directory below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or the platform
    /// watcher cannot be initialized.
    pub fn new(watch_dir: PathBuf, trigger: ScanTrigger) -> Result<Self> {
        if !watch_dir.is_dir() {
            return Err(WatcherError::DirectoryNotFound(watch_dir));
        }

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                handle_notify_event(res, &trigger);
            },
            Config::default(),
        )?;
        watcher.watch(&watch_dir, RecursiveMode::Recursive)?;

        info!(watch_dir = %watch_dir.display(), "Watching wiki pages for changes");

        Ok(Self { watcher, watch_dir })
    }

    /// Returns the directory being watched.
    #[must_use]
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }
}

/// Runs on the notify thread, so it must not block.
fn handle_notify_event(res: std::result::Result<Event, notify::Error>, trigger: &ScanTrigger) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    if !is_relevant_event(&event) {
        return;
    }

    if trigger.request() {
        debug!(kind = ?event.kind, paths = ?event.paths, "Requested history pass");
    }
}

/// Returns `true` if `event` may have changed the set of tracked files.
///
/// A directory rename or removal moves every page inside it, and a removed
/// directory can no longer be inspected, so extension-less paths count too.
fn is_relevant_event(event: &Event) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    );
    if !kind_matters {
        return false;
    }

    event
        .paths
        .iter()
        .any(|path| is_tracked_file(path) || path.extension().is_none() || path.is_dir())
}
