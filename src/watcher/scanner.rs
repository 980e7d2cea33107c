//! Directory scanner for full rebuilds.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use walkdir::WalkDir;

/// Scan statistics.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub entries_found: AtomicU64,
    pub errors: AtomicU64,
}

impl ScanStats {
    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            entries_found: self.entries_found.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scan stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStatsSnapshot {
    pub entries_found: u64,
    pub errors: u64,
}

/// Collect every file and directory under `roots`, the roots included.
///
/// Symlinks are not followed. Unreadable entries are logged and skipped.
#[must_use]
pub fn scan_roots<'a, I>(roots: I) -> (Vec<PathBuf>, ScanStatsSnapshot)
where
    I: IntoIterator<Item = &'a Path>,
{
    let stats = ScanStats::default();
    let mut paths = Vec::new();

    for root in roots {
        tracing::info!(root = %root.display(), "Scanning root directory");

        for entry in WalkDir::new(root).follow_links(false) {
            match entry {
                Ok(entry) => {
                    stats.entries_found.fetch_add(1, Ordering::Relaxed);
                    paths.push(entry.into_path());
                }
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "Error walking directory");
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    let snapshot = stats.snapshot();
    tracing::debug!(
        found = snapshot.entries_found,
        errors = snapshot.errors,
        "Scan complete"
    );
    (paths, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_includes_root_dirs_and_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/photo.jpg"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();

        let (paths, stats) = scan_roots([root]);

        assert_eq!(stats.entries_found, 5);
        assert_eq!(stats.errors, 0);
        assert!(paths.contains(&root.to_path_buf()));
        assert!(paths.contains(&root.join("a/b/photo.jpg")));
    }

    #[test]
    fn test_scan_missing_root_counts_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing");

        let (paths, stats) = scan_roots([missing.as_path()]);

        assert!(paths.is_empty());
        assert_eq!(stats.errors, 1);
    }
}
