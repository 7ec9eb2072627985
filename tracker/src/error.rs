//! Error types for the wiki history tracker.
//!
//! This module defines the error types used throughout the tracker crate,
//! providing structured error handling with clear, human-readable messages.
//!
//! Scan errors (an unreadable file or directory) never reach this type: the
//! scanner logs them and leaves the file out of the snapshot. Everything here
//! is either a store failure, which aborts a reconciliation pass, or a query
//! failure, which is returned to the caller of the history resolver.

use thiserror::Error;

/// Errors that can occur during history tracking operations.
///
/// # Examples
///
/// ```ignore
/// use wiki_history::error::HistoryError;
///
/// fn open(path: &Path) -> Result<(), HistoryError> {
///     let store = HistoryStore::open(path)?;
///     store.capture_file_history(Path::new("data"))?;
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The SQLite history table could not be read or written.
    #[error("history store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// File system I/O error outside of the best-effort scan.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store lock was poisoned by a panicking writer.
    #[error("history store unavailable: {0}")]
    StoreUnavailable(String),

    /// A history query used a path that cannot name a tracked file.
    #[error("invalid history path '{0}'")]
    InvalidPath(String),

    /// A persisted row carried a status outside the known set.
    #[error("invalid history status '{0}'")]
    InvalidStatus(String),
}

impl HistoryError {
    /// Returns `true` if this error was caused by the caller's input rather
    /// than by the store.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPath(_))
    }
}

/// A specialized `Result` type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
