//! History lookup for one logical page.
//!
//! A page can be asked for by its file path (`docs/note.md`), with a leading
//! slash, or by its extension-less route (`docs/note`), which also matches
//! `docs/note.md` and `docs/note/index.md`. From those seed paths the
//! resolver walks backwards through `moved` entries so that a renamed page
//! keeps the history it accumulated under its earlier names.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::error::{HistoryError, Result};
use crate::store::{HistoryLog, HistoryStore};
use crate::types::{FileHistoryEntry, PageHistory};

/// Normalizes a queried path to the form paths are recorded in.
#[must_use]
pub fn normalize_history_path(path: &str) -> String {
    path.trim().replace('\\', "/").trim_start_matches('/').to_string()
}

/// Returns the paths a query for `path` should start from.
///
/// # Errors
///
/// Returns [`HistoryError::InvalidPath`] if the path is empty after
/// normalization, contains a `..` segment, or contains a NUL byte.
pub fn seed_history_paths(path: &str) -> Result<Vec<String>> {
    let normalized = normalize_history_path(path);

    if normalized.is_empty()
        || normalized.contains('\0')
        || normalized.split('/').any(|segment| segment == "..")
    {
        return Err(HistoryError::InvalidPath(path.to_string()));
    }

    let mut seeds = vec![normalized.clone()];

    let trimmed = normalized.trim_end_matches('/');
    let file_name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if !trimmed.is_empty() && !file_name.contains('.') {
        for candidate in [format!("{trimmed}.md"), format!("{trimmed}/index.md")] {
            if !seeds.contains(&candidate) {
                seeds.push(candidate);
            }
        }
    }

    Ok(seeds)
}

/// Collects the full history of the page at `path`, newest first.
///
/// Ties on `recorded_at` are broken by id so that the later insert wins.
///
/// # Errors
///
/// Returns an error if the path is malformed or the log cannot be read.
pub fn resolve_history<L: HistoryLog + ?Sized>(
    log: &L,
    path: &str,
) -> Result<Vec<FileHistoryEntry>> {
    let mut queue: VecDeque<String> = seed_history_paths(path)?.into();
    let mut visited: HashSet<String> = HashSet::new();
    let mut seen_ids: HashSet<i64> = HashSet::new();
    let mut history = Vec::new();

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }

        for entry in log.entries_touching(&current)? {
            if let Some(previous) = &entry.previous_path {
                if !visited.contains(previous) {
                    queue.push_back(previous.clone());
                }
            }
            if seen_ids.insert(entry.id) {
                history.push(entry);
            }
        }
    }

    history.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));

    debug!(
        path = %path,
        visited = visited.len(),
        entries = history.len(),
        "Resolved page history"
    );

    Ok(history)
}

/// Digest of the newest non-deleted entry recorded at one of `seeds`.
fn current_hash(history: &[FileHistoryEntry], seeds: &[String]) -> Option<String> {
    history
        .iter()
        .find(|entry| !entry.is_deleted() && seeds.contains(&entry.path))
        .map(|entry| entry.hash.clone())
}

impl HistoryStore {
    /// History of the page at `path`, newest first.
    ///
    /// The whole walk runs under the store lock.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::InvalidPath`] for a malformed path and a store
    /// error if the log cannot be read. A path with no history is not an
    /// error.
    pub fn history_for_path(&self, path: &str) -> Result<Vec<FileHistoryEntry>> {
        self.with_log(|log| resolve_history(&*log, path))
    }

    /// History of the page at `path` together with its current digest.
    ///
    /// # Errors
    ///
    /// Same as [`HistoryStore::history_for_path`].
    pub fn page_history(&self, path: &str) -> Result<PageHistory> {
        let seeds = seed_history_paths(path)?;
        let history = self.history_for_path(path)?;
        let current_hash = current_hash(&history, &seeds);
        Ok(PageHistory {
            history,
            current_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::hash_string;
    use crate::types::{FileRecord, HistoryStatus, NewHistoryEntry};

    fn record(content: &str) -> FileRecord {
        FileRecord {
            hash: hash_string(content),
            content: content.to_string(),
        }
    }

    #[test]
    fn normalize_trims_and_converts_separators() {
        assert_eq!(normalize_history_path("  /docs/note.md "), "docs/note.md");
        assert_eq!(normalize_history_path("docs\\guide\\a.md"), "docs/guide/a.md");
        assert_eq!(normalize_history_path("///a.md"), "a.md");
    }

    #[test]
    fn seeds_add_route_variants_without_extension() {
        assert_eq!(
            seed_history_paths("/docs/note").unwrap(),
            vec!["docs/note", "docs/note.md", "docs/note/index.md"]
        );
        assert_eq!(seed_history_paths("docs/note.md").unwrap(), vec!["docs/note.md"]);
    }

    #[test]
    fn seeds_only_look_at_final_segment_for_extension() {
        assert_eq!(
            seed_history_paths("v1.2/intro").unwrap(),
            vec!["v1.2/intro", "v1.2/intro.md", "v1.2/intro/index.md"]
        );
    }

    #[test]
    fn seeds_reject_malformed_paths() {
        for bad in ["", "   ", "/", "../secret.md", "docs/../../x", "a\0b.md"] {
            let err = seed_history_paths(bad).unwrap_err();
            assert!(matches!(err, HistoryError::InvalidPath(_)), "accepted {bad:?}");
        }
    }

    #[test]
    fn unknown_path_has_empty_history() {
        let store = HistoryStore::open_in_memory().unwrap();
        assert!(store.history_for_path("never/seen").unwrap().is_empty());

        let page = store.page_history("never/seen").unwrap();
        assert!(page.history.is_empty());
        assert_eq!(page.current_hash, None);
    }

    #[test]
    fn walks_back_through_renames() {
        let store = HistoryStore::open_in_memory().unwrap();
        let v1 = record("# v1");
        store.append(&NewHistoryEntry::created("a.md", &v1)).unwrap();
        store.append(&NewHistoryEntry::moved("b/a.md", &v1, "a.md")).unwrap();
        store.append(&NewHistoryEntry::moved("c/a.md", &v1, "b/a.md")).unwrap();
        store.append(&NewHistoryEntry::created("unrelated.md", &record("x"))).unwrap();

        let history = store.history_for_path("c/a.md").unwrap();

        let paths: Vec<_> = history.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["c/a.md", "b/a.md", "a.md"]);
    }

    #[test]
    fn route_query_matches_index_page() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.append(&NewHistoryEntry::created("guide/index.md", &record("# guide"))).unwrap();

        let history = store.history_for_path("/guide").unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].path, "guide/index.md");
    }

    #[test]
    fn equal_timestamps_order_by_id_descending() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.append(&NewHistoryEntry::created("a.md", &record("1"))).unwrap();
        store.append(&NewHistoryEntry::modified("a.md", &record("2"))).unwrap();
        store.append(&NewHistoryEntry::modified("a.md", &record("3"))).unwrap();

        let history = store.history_for_path("a.md").unwrap();

        let ids: Vec<_> = history.iter().map(|e| e.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(ids, sorted);
        assert_eq!(history[0].content, "3");
    }

    #[test]
    fn current_hash_skips_deleted_entries() {
        let store = HistoryStore::open_in_memory().unwrap();
        let v2 = record("# v2");
        store.append(&NewHistoryEntry::created("a.md", &record("# v1"))).unwrap();
        store.append(&NewHistoryEntry::modified("a.md", &v2)).unwrap();
        let last = store.history_for_path("a.md").unwrap().remove(0);
        store.append(&NewHistoryEntry::deleted(&last)).unwrap();

        let page = store.page_history("a").unwrap();

        assert_eq!(page.history[0].status, HistoryStatus::Deleted);
        assert_eq!(page.current_hash, Some(v2.hash));
    }

    #[test]
    fn current_hash_ignores_entries_at_earlier_names() {
        let store = HistoryStore::open_in_memory().unwrap();
        let v1 = record("# v1");
        store.append(&NewHistoryEntry::created("old.md", &v1)).unwrap();
        store.append(&NewHistoryEntry::modified("old.md", &record("# v2"))).unwrap();
        store.append(&NewHistoryEntry::moved("new/old.md", &record("# v2"), "old.md")).unwrap();

        let page = store.page_history("new/old.md").unwrap();
        assert_eq!(page.history.len(), 3);
        assert_eq!(page.current_hash, Some(hash_string("# v2")));

        let source = store.page_history("old.md").unwrap();
        assert_eq!(source.current_hash, Some(hash_string("# v2")));
    }

    #[test]
    fn invalid_path_is_reported_by_store_queries() {
        let store = HistoryStore::open_in_memory().unwrap();
        assert!(store.history_for_path("../etc/passwd").unwrap_err().is_client_error());
        assert!(store.page_history("").unwrap_err().is_client_error());
    }
}
