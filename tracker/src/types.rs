//! Core types for the file history log.
//!
//! The log is append-only: [`FileHistoryEntry`] rows are never updated or
//! deleted once written. Everything else in this module is either the input
//! to an append ([`NewHistoryEntry`]) or pass-local state derived from a scan
//! or from the log ([`FileSnapshot`], [`LatestState`]).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// Classification of a single history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    /// The path appeared with no prior live entry.
    Created,
    /// The path existed and its content hash changed.
    Modified,
    /// The path disappeared and was not consumed by a move.
    Deleted,
    /// The content arrived at this path from `previous_path`.
    Moved,
}

impl HistoryStatus {
    /// Returns the persisted text form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Moved => "moved",
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HistoryStatus {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "modified" => Ok(Self::Modified),
            "deleted" => Ok(Self::Deleted),
            "moved" => Ok(Self::Moved),
            other => Err(HistoryError::InvalidStatus(other.to_string())),
        }
    }
}

/// One row of the append-only history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHistoryEntry {
    /// Store-assigned sequence number.
    pub id: i64,

    /// Slash-separated path relative to the tracked root.
    pub path: String,

    /// SHA-256 hex digest of `content`.
    pub hash: String,

    /// Full file content at the time of capture.
    pub content: String,

    /// What happened to the path.
    pub status: HistoryStatus,

    /// Source path of a move. Present only when `status` is `moved`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,

    /// Store clock at insert time.
    pub recorded_at: DateTime<Utc>,
}

impl FileHistoryEntry {
    /// Returns `true` if this entry marks its path as absent.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.status == HistoryStatus::Deleted
    }
}

/// An entry waiting to be appended. The store assigns `id` and `recorded_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub path: String,
    pub hash: String,
    pub content: String,
    pub status: HistoryStatus,
    pub previous_path: Option<String>,
}

impl NewHistoryEntry {
    fn new(
        path: impl Into<String>,
        record: &FileRecord,
        status: HistoryStatus,
        previous_path: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            hash: record.hash.clone(),
            content: record.content.clone(),
            status,
            previous_path,
        }
    }

    #[must_use]
    pub fn created(path: impl Into<String>, record: &FileRecord) -> Self {
        Self::new(path, record, HistoryStatus::Created, None)
    }

    #[must_use]
    pub fn modified(path: impl Into<String>, record: &FileRecord) -> Self {
        Self::new(path, record, HistoryStatus::Modified, None)
    }

    /// A deletion keeps the last known content of the path.
    #[must_use]
    pub fn deleted(last: &FileHistoryEntry) -> Self {
        Self {
            path: last.path.clone(),
            hash: last.hash.clone(),
            content: last.content.clone(),
            status: HistoryStatus::Deleted,
            previous_path: None,
        }
    }

    #[must_use]
    pub fn moved(
        path: impl Into<String>,
        record: &FileRecord,
        previous_path: impl Into<String>,
    ) -> Self {
        Self::new(
            path,
            record,
            HistoryStatus::Moved,
            Some(previous_path.into()),
        )
    }
}

/// Content and digest of one file captured by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub hash: String,
    pub content: String,
}

/// Live filesystem state for one pass: relative path to captured file.
///
/// Ordered so that a pass appends its entries in a stable order.
pub type FileSnapshot = BTreeMap<String, FileRecord>;

/// Believed state of every path ever recorded, derived fresh from the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestState {
    /// Most recent entry per path (highest id).
    pub entries: HashMap<String, FileHistoryEntry>,

    /// Paths whose latest incarnation was carried away by a later move.
    pub alias_paths: HashSet<String>,
}

impl LatestState {
    /// Returns the latest entry for `path`, if the path was ever recorded.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileHistoryEntry> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn is_alias(&self, path: &str) -> bool {
        self.alias_paths.contains(path)
    }

    /// Returns `true` if the log believes `path` currently exists.
    #[must_use]
    pub fn is_live(&self, path: &str) -> bool {
        !self.is_alias(path) && self.get(path).is_some_and(|entry| !entry.is_deleted())
    }
}

/// Ordered history of one logical file together with its current digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageHistory {
    /// Entries newest first.
    pub history: Vec<FileHistoryEntry>,

    /// Digest of the newest non-deleted entry at the queried path.
    pub current_hash: Option<String>,
}

/// Counts of entries written by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub created: usize,
    pub modified: usize,
    pub moved: usize,
    pub deleted: usize,
}

impl PassSummary {
    pub(crate) fn record(&mut self, status: HistoryStatus) {
        match status {
            HistoryStatus::Created => self.created += 1,
            HistoryStatus::Modified => self.modified += 1,
            HistoryStatus::Moved => self.moved += 1,
            HistoryStatus::Deleted => self.deleted += 1,
        }
    }

    /// Total number of entries appended.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.modified + self.moved + self.deleted
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_entry(status: HistoryStatus, previous_path: Option<&str>) -> FileHistoryEntry {
        FileHistoryEntry {
            id: 7,
            path: "docs/note.md".to_string(),
            hash: "abc".to_string(),
            content: "# note".to_string(),
            status,
            previous_path: previous_path.map(str::to_string),
            recorded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn status_parses_persisted_form() {
        for status in [
            HistoryStatus::Created,
            HistoryStatus::Modified,
            HistoryStatus::Deleted,
            HistoryStatus::Moved,
        ] {
            assert_eq!(status.as_str().parse::<HistoryStatus>().unwrap(), status);
        }
    }

    #[test]
    fn status_rejects_unknown_text() {
        let err = "renamed".parse::<HistoryStatus>().unwrap_err();
        assert!(matches!(err, HistoryError::InvalidStatus(ref s) if s == "renamed"));
    }

    #[test]
    fn entry_serializes_camel_case_with_iso_timestamp() {
        let entry = sample_entry(HistoryStatus::Moved, Some("note.md"));
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["status"], "moved");
        assert_eq!(json["previousPath"], "note.md");
        assert_eq!(json["recordedAt"], "2024-05-01T12:30:00Z");
        assert!(json.get("previous_path").is_none());
    }

    #[test]
    fn entry_omits_absent_previous_path() {
        let entry = sample_entry(HistoryStatus::Created, None);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("previousPath"));
    }

    #[test]
    fn deleted_entry_keeps_last_content() {
        let last = sample_entry(HistoryStatus::Modified, None);
        let deleted = NewHistoryEntry::deleted(&last);
        assert_eq!(deleted.status, HistoryStatus::Deleted);
        assert_eq!(deleted.content, "# note");
        assert_eq!(deleted.hash, "abc");
        assert!(deleted.previous_path.is_none());
    }

    #[test]
    fn latest_state_alias_is_not_live() {
        let mut state = LatestState::default();
        state.entries.insert(
            "docs/note.md".to_string(),
            sample_entry(HistoryStatus::Modified, None),
        );
        assert!(state.is_live("docs/note.md"));

        state.alias_paths.insert("docs/note.md".to_string());
        assert!(!state.is_live("docs/note.md"));
        assert!(!state.is_live("missing.md"));
    }

    #[test]
    fn pass_summary_counts() {
        let mut summary = PassSummary::default();
        assert!(summary.is_empty());
        summary.record(HistoryStatus::Created);
        summary.record(HistoryStatus::Moved);
        summary.record(HistoryStatus::Moved);
        assert_eq!(summary.moved, 2);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn page_history_serializes_current_hash() {
        let page = PageHistory {
            history: vec![sample_entry(HistoryStatus::Created, None)],
            current_hash: Some("abc".to_string()),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["currentHash"], "abc");
        assert_eq!(json["history"].as_array().unwrap().len(), 1);
    }
}
