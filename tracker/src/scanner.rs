//! Content scanner for the tracked Markdown tree.
//!
//! Walks the tracked root, reads every `.md` file and returns a
//! [`FileSnapshot`] keyed by slash-separated relative path.
//!
//! The scan is best-effort: an unreadable file or subdirectory is logged and
//! left out of the snapshot rather than failing the pass. A missing root
//! yields an empty snapshot, which models a wiki where nothing has been
//! written yet.

use std::fs;
use std::io;
use std::path::{Component, Path};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::types::{FileRecord, FileSnapshot};

/// Extension of tracked page files.
pub const TRACKED_EXTENSION: &str = "md";

/// Scans `root` recursively and captures every Markdown file.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use wiki_history::scanner::scan_markdown_files;
///
/// let snapshot = scan_markdown_files(Path::new("data"));
/// for (path, record) in &snapshot {
///     println!("{path} {}", record.hash);
/// }
/// ```
#[must_use]
pub fn scan_markdown_files(root: &Path) -> FileSnapshot {
    let mut snapshot = FileSnapshot::new();

    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            warn!(root = %root.display(), "History root is not a directory");
            return snapshot;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(root = %root.display(), "History root does not exist yet");
            return snapshot;
        }
        Err(e) => {
            warn!(root = %root.display(), error = %e, "Failed to stat history root");
            return snapshot;
        }
    }

    scan_directory_recursive(root, root, &mut snapshot);

    debug!(
        root = %root.display(),
        file_count = snapshot.len(),
        "Scanned Markdown files"
    );

    snapshot
}

fn scan_directory_recursive(root: &Path, dir: &Path, snapshot: &mut FileSnapshot) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to read directory, skipping");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                continue;
            }
        };

        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file type");
                continue;
            }
        };

        if file_type.is_dir() {
            scan_directory_recursive(root, &path, snapshot);
            continue;
        }

        if !is_tracked_file(&path) {
            continue;
        }

        let Some(rel_path) = relative_slash_path(root, &path) else {
            warn!(path = %path.display(), "Failed to compute relative path");
            continue;
        };

        match fs::read(&path) {
            Ok(bytes) => {
                // The digest covers the text as stored, not the raw bytes.
                let content = String::from_utf8_lossy(&bytes).into_owned();
                let record = FileRecord {
                    hash: hash_string(&content),
                    content,
                };
                snapshot.insert(rel_path, record);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file, skipping");
            }
        }
    }
}

/// Returns `true` if `path` carries the tracked extension.
#[must_use]
pub fn is_tracked_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TRACKED_EXTENSION)
}

/// Converts `path` to a `/`-separated path relative to `root`.
fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Computes the lowercase hex SHA-256 digest of `data`.
#[must_use]
pub fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Computes the digest of a string, matching [`hash_content`] on its bytes.
#[must_use]
pub fn hash_string(content: &str) -> String {
    hash_content(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    #[test]
    fn scans_nested_markdown_with_slash_paths() {
        let temp_dir = create_test_dir();
        write_file(temp_dir.path(), "index.md", "# home");
        write_file(temp_dir.path(), "docs/guide/setup.md", "# setup");

        let snapshot = scan_markdown_files(temp_dir.path());

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key("index.md"));
        let setup = snapshot.get("docs/guide/setup.md").expect("nested file");
        assert_eq!(setup.content, "# setup");
        assert_eq!(setup.hash, hash_string("# setup"));
    }

    #[test]
    fn skips_non_markdown_files() {
        let temp_dir = create_test_dir();
        write_file(temp_dir.path(), "page.md", "# page");
        write_file(temp_dir.path(), "image.png", "not really a png");
        write_file(temp_dir.path(), "notes.markdown", "# other extension");
        write_file(temp_dir.path(), "README", "no extension");

        let snapshot = scan_markdown_files(temp_dir.path());

        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["page.md"]);
    }

    #[test]
    fn directory_named_like_markdown_is_descended() {
        let temp_dir = create_test_dir();
        write_file(temp_dir.path(), "weird.md/inner.md", "# inner");

        let snapshot = scan_markdown_files(temp_dir.path());

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("weird.md/inner.md"));
    }

    #[test]
    fn missing_root_yields_empty_snapshot() {
        let temp_dir = create_test_dir();
        let snapshot = scan_markdown_files(&temp_dir.path().join("not-created"));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn root_that_is_a_file_yields_empty_snapshot() {
        let temp_dir = create_test_dir();
        let file = write_file(temp_dir.path(), "root.md", "# file");
        assert!(scan_markdown_files(&file).is_empty());
    }

    #[test]
    fn non_utf8_content_is_hashed_as_stored() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("a.md"), [0x23, 0x20, 0xff]).unwrap();
        fs::write(temp_dir.path().join("b.md"), [0x23, 0x20, 0xfe]).unwrap();

        let snapshot = scan_markdown_files(temp_dir.path());
        let a = snapshot.get("a.md").unwrap();
        let b = snapshot.get("b.md").unwrap();

        assert_eq!(a.content, "# \u{fffd}");
        assert_eq!(a.hash, hash_string(&a.content));
        assert_eq!(a.content, b.content);
        assert_eq!(a.hash, b.hash);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = create_test_dir();
        write_file(temp_dir.path(), "ok.md", "# ok");
        let locked = write_file(temp_dir.path(), "locked.md", "# locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let snapshot = scan_markdown_files(temp_dir.path());

        assert!(snapshot.contains_key("ok.md"));
        // Root can read anything, so only assert the absence when the read fails.
        if fs::read(&locked).is_err() {
            assert!(!snapshot.contains_key("locked.md"));
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn hash_is_sha256_hex() {
        let hash = hash_string("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn hash_is_deterministic_and_content_sensitive() {
        assert_eq!(hash_string("# note"), hash_string("# note"));
        assert_ne!(hash_string("# note"), hash_string("# note\n"));
    }

    #[test]
    fn relative_path_rejects_root_itself() {
        let root = Path::new("/data");
        assert_eq!(relative_slash_path(root, root), None);
        assert_eq!(
            relative_slash_path(root, Path::new("/data/a/b.md")),
            Some("a/b.md".to_string())
        );
    }
}
