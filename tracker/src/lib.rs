//! Wiki History - file history tracking for a Markdown wiki.
//!
//! This crate records how the `.md` files under a wiki's data directory
//! change over time and answers "what happened to this page?" queries.
//!
//! # Overview
//!
//! A reconciliation pass scans the tracked root, compares it with the latest
//! state recorded in an append-only SQLite log, and appends one entry per
//! change: `created`, `modified`, `deleted`, or `moved`. A rename is detected
//! when a vanished file's content and basename reappear at a new path, so the
//! page keeps its history across moves.
//!
//! Passes are driven by a single background task that runs on a timer, on
//! request, and once at startup. A filesystem watcher can feed it requests.
//!
//! # Modules
//!
//! - [`types`]: History entries, snapshots and pass summaries
//! - [`scanner`]: Recursive Markdown scan with SHA-256 digests
//! - [`store`]: Append-only SQLite history log
//! - [`reconciler`]: Change classification and move detection
//! - [`resolver`]: Page history lookup across renames
//! - [`trigger`]: Background pass driver with coalesced requests
//! - [`watcher`]: Filesystem watcher that requests passes
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for history operations

pub mod config;
pub mod error;
pub mod reconciler;
pub mod resolver;
pub mod scanner;
pub mod store;
pub mod trigger;
pub mod types;
pub mod watcher;

pub use config::{Config, ConfigError};
pub use error::{HistoryError, Result};
pub use reconciler::plan_changes;
pub use resolver::{normalize_history_path, resolve_history, seed_history_paths};
pub use scanner::{hash_content, hash_string, scan_markdown_files};
pub use store::{HistoryLog, HistoryStore};
pub use trigger::{HistoryRecorder, RecorderSettings, ScanTrigger};
pub use types::{
    FileHistoryEntry, FileRecord, FileSnapshot, HistoryStatus, LatestState, NewHistoryEntry,
    PageHistory, PassSummary,
};
pub use watcher::{HistoryWatcher, WatcherError};
