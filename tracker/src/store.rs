//! SQLite-backed append-only history log.
//!
//! # Schema
//!
//! One table, `file_history`, holds every entry ever recorded. Rows are
//! inserted and never updated or deleted, so the table is the only durable
//! state of the tracker: the latest-state index is recomputed from it at the
//! start of every reconciliation pass.
//!
//! # Locking
//!
//! [`HistoryStore`] owns a single connection behind a mutex. Every read and
//! write acquires that lock, and [`HistoryStore::with_log`] holds it for the
//! whole closure so that a pass's read-then-write sequence is atomic with
//! respect to other readers and writers of the same store.
//!
//! # Timestamps
//!
//! `recorded_at` is assigned by the store clock in RFC 3339 form with
//! millisecond precision. Older rows written by other tools may use
//! `YYYY-MM-DD HH:MM:SS` with or without an offset; all three layouts are
//! accepted when reading.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::{debug, info, warn};

use crate::error::{HistoryError, Result};
use crate::types::{FileHistoryEntry, LatestState, NewHistoryEntry};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS file_history (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        path          TEXT NOT NULL,
        hash          TEXT NOT NULL,
        content       TEXT NOT NULL,
        status        TEXT NOT NULL,
        previous_path TEXT,
        recorded_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
    CREATE INDEX IF NOT EXISTS idx_file_history_path ON file_history (path);
    CREATE INDEX IF NOT EXISTS idx_file_history_previous_path ON file_history (previous_path);
";

const ENTRY_COLUMNS: &str = "id, path, hash, content, status, previous_path, recorded_at";

/// Read access to the history log plus the single write it allows.
///
/// The reconciler and the history resolver are written against this trait
/// so the log can be swapped for a test double.
pub trait HistoryLog {
    /// Returns the latest entry for every path ever recorded, together with
    /// the paths whose latest incarnation was consumed by a later move.
    fn latest_snapshots(&self) -> Result<LatestState>;

    /// Appends one entry and returns its assigned id.
    fn append(&mut self, entry: &NewHistoryEntry) -> Result<i64>;

    /// Returns every entry recorded at `path` or moved away from `path`.
    fn entries_touching(&self, path: &str) -> Result<Vec<FileHistoryEntry>>;
}

/// [`HistoryLog`] over a locked SQLite connection.
pub struct SqliteLog<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteLog<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query_entries(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<FileHistoryEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, RawEntry::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }
}

impl HistoryLog for SqliteLog<'_> {
    fn latest_snapshots(&self) -> Result<LatestState> {
        let latest = self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS}
                 FROM file_history
                 WHERE id IN (SELECT MAX(id) FROM file_history GROUP BY path)"
            ),
            &[],
        )?;

        let mut state = LatestState::default();
        for entry in latest {
            state.entries.insert(entry.path.clone(), entry);
        }

        let mut stmt = self.conn.prepare(
            "SELECT previous_path, MAX(id)
             FROM file_history
             WHERE status = 'moved' AND previous_path IS NOT NULL
             GROUP BY previous_path",
        )?;
        let moves = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in moves {
            let (source, move_id) = row?;
            let consumed = state
                .entries
                .get(&source)
                .is_none_or(|entry| entry.id < move_id);
            if consumed {
                state.alias_paths.insert(source);
            }
        }

        Ok(state)
    }

    fn append(&mut self, entry: &NewHistoryEntry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO file_history (path, hash, content, status, previous_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.path,
                entry.hash,
                entry.content,
                entry.status.as_str(),
                entry.previous_path,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn entries_touching(&self, path: &str) -> Result<Vec<FileHistoryEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS}
                 FROM file_history
                 WHERE path = ?1 OR previous_path = ?1
                 ORDER BY id DESC"
            ),
            &[&path],
        )
    }
}

/// Row as stored, before status and timestamp are parsed.
struct RawEntry {
    id: i64,
    path: String,
    hash: String,
    content: String,
    status: String,
    previous_path: Option<String>,
    recorded_at: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            hash: row.get(2)?,
            content: row.get(3)?,
            status: row.get(4)?,
            previous_path: row.get(5)?,
            recorded_at: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<FileHistoryEntry> {
        Ok(FileHistoryEntry {
            id: self.id,
            status: self.status.parse()?,
            recorded_at: parse_store_timestamp(&self.recorded_at),
            path: self.path,
            hash: self.hash,
            content: self.content,
            previous_path: self.previous_path,
        })
    }
}

/// Parses a `recorded_at` value written in any of the accepted layouts.
///
/// Unparseable values read as the Unix epoch so a single bad row cannot
/// hide the rest of a file's history.
#[must_use]
pub fn parse_store_timestamp(value: &str) -> DateTime<Utc> {
    let value = value.trim();
    if value.is_empty() {
        return DateTime::<Utc>::default();
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return ts.with_timezone(&Utc);
    }

    // Space-separated with an offset; a bare `Z` counts as UTC.
    let with_offset = match value.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => value.to_string(),
    };
    for layout in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(ts) = DateTime::parse_from_str(&with_offset, layout) {
            return ts.with_timezone(&Utc);
        }
    }

    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, layout) {
            return ts.and_utc();
        }
    }

    warn!(value = %value, "Unrecognized history timestamp, using epoch");
    DateTime::<Utc>::default()
}

/// Durable history log for one tracked root.
///
/// # Thread Safety
///
/// The connection is guarded by a `Mutex`, so a `HistoryStore` can be shared
/// behind an `Arc` between the scan driver and request handlers. All access
/// is blocking; async callers should use `tokio::task::spawn_blocking`.
pub struct HistoryStore {
    conn: Mutex<Connection>,
    location: String,
}

impl HistoryStore {
    /// Opens (or creates) the history database at `path`.
    ///
    /// Parent directories are created as needed and the schema is applied
    /// idempotently.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the database
    /// cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        let store = Self::from_connection(conn, path.display().to_string())?;
        info!(db_path = %store.location, "Opened history store");
        Ok(store)
    }

    /// Opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        debug!(db_path = %location, "History schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Where the database lives, for logging.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HistoryError::StoreUnavailable(e.to_string()))
    }

    /// Runs `f` with exclusive access to the log.
    ///
    /// No other reader or writer of this store can interleave with the
    /// closure.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::StoreUnavailable`] if the lock is poisoned,
    /// otherwise whatever `f` returns.
    pub fn with_log<T>(&self, f: impl FnOnce(&mut SqliteLog<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        let mut log = SqliteLog::new(&conn);
        f(&mut log)
    }

    /// Latest entry per path, as the reconciler sees it.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn latest_snapshots(&self) -> Result<LatestState> {
        self.with_log(|log| log.latest_snapshots())
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn append(&self, entry: &NewHistoryEntry) -> Result<i64> {
        self.with_log(|log| log.append(entry))
    }

    /// Every entry in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn entries(&self) -> Result<Vec<FileHistoryEntry>> {
        self.with_log(|log| {
            log.query_entries(
                &format!("SELECT {ENTRY_COLUMNS} FROM file_history ORDER BY id"),
                &[],
            )
        })
    }

    /// Total number of entries in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn entry_count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM file_history", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
