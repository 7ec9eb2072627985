//! Reconciliation of live files against the history log.
//!
//! A pass compares a fresh [`FileSnapshot`] with the [`LatestState`] derived
//! from the log and appends one entry per observed change:
//!
//! - a path never seen (or last seen deleted) becomes `created`
//! - a live path whose digest changed becomes `modified`
//! - a new path carrying the content and basename of a vanished path becomes
//!   `moved`, and the vanished path produces no deletion
//! - any other vanished path becomes `deleted`
//!
//! Planning is pure ([`plan_changes`]); only [`run_pass`] touches the log.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;
use crate::scanner::scan_markdown_files;
use crate::store::{HistoryLog, HistoryStore};
use crate::types::{FileHistoryEntry, FileSnapshot, LatestState, NewHistoryEntry, PassSummary};

/// Correlates a vanished path with a newly appeared one.
///
/// Content alone is not enough: two unrelated pages may share a template.
/// The basename has to match as well.
fn movement_key(hash: &str, path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    format!("{hash}|{base}")
}

/// Computes the entries one pass should append.
///
/// Entries for present paths come first in path order, followed by deletions
/// in the order the vanished paths were originally recorded.
#[must_use]
pub fn plan_changes(current: &FileSnapshot, latest: &LatestState) -> Vec<NewHistoryEntry> {
    // Vanished paths the log still believes are live, oldest first.
    let mut missing: Vec<&FileHistoryEntry> = latest
        .entries
        .values()
        .filter(|entry| !current.contains_key(&entry.path) && latest.is_live(&entry.path))
        .collect();
    missing.sort_by_key(|entry| entry.id);

    let mut move_candidates: HashMap<String, VecDeque<&FileHistoryEntry>> = HashMap::new();
    for &entry in &missing {
        move_candidates
            .entry(movement_key(&entry.hash, &entry.path))
            .or_default()
            .push_back(entry);
    }

    let mut consumed: BTreeSet<&str> = BTreeSet::new();
    let mut plan = Vec::new();

    for (path, record) in current {
        match latest.get(path) {
            Some(entry) if !latest.is_alias(path) => {
                if entry.is_deleted() {
                    plan.push(NewHistoryEntry::created(path.as_str(), record));
                } else if entry.hash != record.hash {
                    plan.push(NewHistoryEntry::modified(path.as_str(), record));
                }
            }
            _ => {
                let source = move_candidates
                    .get_mut(&movement_key(&record.hash, path))
                    .and_then(VecDeque::pop_front);

                match source {
                    Some(source) => {
                        consumed.insert(source.path.as_str());
                        plan.push(NewHistoryEntry::moved(
                            path.as_str(),
                            record,
                            source.path.as_str(),
                        ));
                    }
                    None => plan.push(NewHistoryEntry::created(path.as_str(), record)),
                }
            }
        }
    }

    plan.extend(
        missing
            .into_iter()
            .filter(|entry| !consumed.contains(entry.path.as_str()))
            .map(NewHistoryEntry::deleted),
    );

    plan
}

/// Runs one pass against `log` for an already captured snapshot.
///
/// Entries are appended in plan order. The first append failure aborts the
/// pass; entries written before it stay in the log.
///
/// # Errors
///
/// Returns the first store error encountered.
pub fn run_pass<L: HistoryLog + ?Sized>(
    log: &mut L,
    current: &FileSnapshot,
) -> Result<PassSummary> {
    let latest = log.latest_snapshots()?;
    let plan = plan_changes(current, &latest);

    let mut summary = PassSummary::default();
    for entry in &plan {
        let id = log.append(entry)?;
        debug!(
            id,
            path = %entry.path,
            status = %entry.status,
            previous_path = ?entry.previous_path,
            "Recorded history entry"
        );
        summary.record(entry.status);
    }

    Ok(summary)
}

impl HistoryStore {
    /// Scans `root` and records every change since the previous pass.
    ///
    /// The scan happens outside the store lock; the read of the latest state
    /// and all appends happen under it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written. Unreadable
    /// files are skipped, not reported.
    pub fn capture_file_history(&self, root: &Path) -> Result<PassSummary> {
        let current = scan_markdown_files(root);
        let summary = self.with_log(|log| run_pass(log, &current))?;

        if summary.is_empty() {
            debug!(root = %root.display(), files = current.len(), "History pass found no changes");
        } else {
            info!(
                root = %root.display(),
                created = summary.created,
                modified = summary.modified,
                moved = summary.moved,
                deleted = summary.deleted,
                "History pass recorded changes"
            );
        }

        Ok(summary)
    }
}
