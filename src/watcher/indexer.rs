//! Index synchronization: the only writer of the node index.
//!
//! Upserts are applied shortest canonical path first so a parent directory is
//! always stored before its children. Deletes run deepest first; the store
//! cascades a directory delete to everything below it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::filter::MediaFilter;
use super::listener::FileChangeListener;
use super::scanner::scan_roots;
use super::stats::{BatchReport, SyncStats, UpsertOutcome};
use super::tokenizer::{distinct_tokens, filename_tokens};
use crate::error::IndexError;
use crate::observability::spans;
use crate::services::{
    AuthorizationOracle, CaptureMetadata, LocationIndex, MetadataExtractor, NoMetadata, Principal,
    SqliteLocationIndex,
};
use crate::storage::{
    delete_node_by_path, find_node_id_by_path, merge_node, node_is_current,
    replace_filename_parts, replace_tags, Database, Location, NodeUpsert, TagSource,
};
use crate::{Error, Result};

/// Whether a rebuild may skip nodes that are already up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    /// Skip paths whose stored `last_modified` is not older than the file.
    Incremental,
    /// Re-derive every node.
    Force,
}

/// Applies upsert and delete batches to the index.
pub struct IndexSynchronizer {
    db: Database,
    filter: MediaFilter,
    metadata: Arc<dyn MetadataExtractor>,
    locations: Arc<dyn LocationIndex>,
    authorization: Arc<dyn AuthorizationOracle>,
    stats: Arc<SyncStats>,
}

impl IndexSynchronizer {
    /// Create a synchronizer with no metadata extraction and the
    /// database-backed location index.
    #[must_use]
    pub fn new(db: Database, filter: MediaFilter, authorization: Arc<dyn AuthorizationOracle>) -> Self {
        Self {
            locations: Arc::new(SqliteLocationIndex::new(db.clone())),
            db,
            filter,
            metadata: Arc::new(NoMetadata),
            authorization,
            stats: SyncStats::new(),
        }
    }

    /// Use a different metadata extractor.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataExtractor>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Use a different location index.
    #[must_use]
    pub fn with_locations(mut self, locations: Arc<dyn LocationIndex>) -> Self {
        self.locations = locations;
        self
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> Arc<SyncStats> {
        Arc::clone(&self.stats)
    }

    /// Canonical directories of every root, as seen by an elevated principal.
    fn authorized_roots(&self) -> Result<HashSet<PathBuf>> {
        let roots = self.authorization.root_directories(&Principal::Elevated)?;
        Ok(roots
            .into_values()
            .map(|dir| dir.canonicalize().unwrap_or(dir))
            .collect())
    }

    /// Upsert then delete, each in its safe order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root set cannot be determined. Per-path
    /// failures are logged and counted in the report.
    pub fn sync(&self, updated: &HashSet<PathBuf>, deleted: &HashSet<PathBuf>) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        if !updated.is_empty() {
            let roots = self.authorized_roots()?;
            let span = spans::batch_span("upsert", updated.len());
            let _guard = span.enter();
            report = self.upsert_paths(updated.iter().cloned(), RebuildMode::Incremental, &roots);
        }

        if !deleted.is_empty() {
            let span = spans::batch_span("delete", deleted.len());
            let _guard = span.enter();
            let deletes = self.delete_paths(deleted.iter().map(PathBuf::as_path));
            report.deleted += deletes.deleted;
            report.errors += deletes.errors;
        }

        tracing::info!(
            upserted = report.upserted,
            skipped = report.skipped,
            filtered = report.filtered,
            deleted = report.deleted,
            errors = report.errors,
            "Batch applied"
        );
        Ok(report)
    }

    /// Walk every authorized root and upsert everything found.
    ///
    /// Rows for paths no longer on disk are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the root set cannot be determined.
    pub fn rebuild(&self, mode: RebuildMode) -> Result<BatchReport> {
        let roots = self.authorized_roots()?;
        let span = spans::rebuild_span(roots.len());
        let _guard = span.enter();

        tracing::info!(roots = roots.len(), ?mode, "Starting full rebuild");
        let (paths, scan) = scan_roots(roots.iter().map(PathBuf::as_path));
        let mut report = self.upsert_paths(paths, mode, &roots);
        report.errors += scan.errors;

        tracing::info!(
            upserted = report.upserted,
            skipped = report.skipped,
            filtered = report.filtered,
            errors = report.errors,
            "Full rebuild complete"
        );
        Ok(report)
    }

    /// Upsert `paths` shortest canonical path first.
    fn upsert_paths<I>(&self, paths: I, mode: RebuildMode, roots: &HashSet<PathBuf>) -> BatchReport
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut report = BatchReport::default();

        let mut canonical: Vec<PathBuf> = Vec::new();
        for path in paths {
            match path.canonicalize() {
                Ok(p) => canonical.push(p),
                Err(_) => {
                    report.errors += 1;
                    tracing::debug!(error = %IndexError::vanished(&path), "Skipping path");
                }
            }
        }
        canonical.sort_by(|a, b| {
            a.as_os_str()
                .len()
                .cmp(&b.as_os_str().len())
                .then_with(|| a.cmp(b))
        });
        canonical.dedup();

        for path in &canonical {
            match self.upsert_one(path, mode, roots) {
                Ok(outcome) => report.count(outcome),
                Err(e) => {
                    report.errors += 1;
                    log_item_failure(path, &e);
                }
            }
        }

        self.stats.record(&report);
        report
    }

    /// Upsert a single canonical path.
    fn upsert_one(
        &self,
        path: &Path,
        mode: RebuildMode,
        roots: &HashSet<PathBuf>,
    ) -> Result<UpsertOutcome> {
        let metadata = std::fs::metadata(path).map_err(|_| IndexError::vanished(path))?;
        let is_directory = metadata.is_dir();

        if !is_directory && !self.filter.is_allowed(path) {
            tracing::trace!(path = %path.display(), "Extension not allowed");
            return Ok(UpsertOutcome::Filtered);
        }

        let path_str = path.to_string_lossy().to_string();
        let last_modified: DateTime<Utc> = metadata.modified()?.into();

        if mode == RebuildMode::Incremental
            && self
                .db
                .with_conn(|conn| node_is_current(conn, &path_str, last_modified))?
        {
            tracing::trace!(path = %path.display(), "Index entry up to date");
            return Ok(UpsertOutcome::Skipped);
        }

        let parent_id = if is_directory && roots.contains(path) {
            None
        } else {
            Some(self.parent_id(path)?)
        };

        let tokens = filename_tokens(path, is_directory);
        let filename_tags = distinct_tokens(&tokens);

        if is_directory {
            let node = NodeUpsert::directory(path_str, parent_id, last_modified);
            self.db.with_transaction(|conn| {
                let id = merge_node(conn, &node)?;
                replace_filename_parts(conn, id, &tokens)?;
                replace_tags(conn, id, TagSource::Filename, &filename_tags)?;
                Ok(())
            })?;
            tracing::debug!(path = %path.display(), "Indexed directory");
            return Ok(UpsertOutcome::Indexed);
        }

        let parent_id = parent_id.ok_or_else(|| IndexError::parent_not_indexed(path))?;
        let (content_type, file_type) = MediaFilter::content_type(path)?;
        let capture = self.capture_metadata(path)?;
        let nearest = match capture.location {
            Some(point) => self
                .locations
                .nearest(point)
                .map_err(|e| IndexError::Location(e.to_string()))?,
            None => None,
        };
        let location_tags = nearest.as_ref().map(Location::tag_texts).unwrap_or_default();

        let node = NodeUpsert::file(path_str, parent_id, file_type, content_type, last_modified)
            .with_location(capture.location)
            .with_date_taken(capture.date_taken)
            .with_nearest_location(nearest.and_then(|l| l.id));

        self.db.with_transaction(|conn| {
            let id = merge_node(conn, &node)?;
            replace_filename_parts(conn, id, &tokens)?;
            replace_tags(conn, id, TagSource::Filename, &filename_tags)?;
            replace_tags(conn, id, TagSource::Location, &location_tags)?;
            Ok(())
        })?;

        tracing::debug!(path = %path.display(), ?file_type, "Indexed file");
        Ok(UpsertOutcome::Indexed)
    }

    fn parent_id(&self, path: &Path) -> Result<i64> {
        let parent = path
            .parent()
            .ok_or_else(|| IndexError::parent_not_indexed(path))?;
        let parent_str = parent.to_string_lossy();

        self.db
            .with_conn(|conn| find_node_id_by_path(conn, &parent_str))?
            .ok_or_else(|| IndexError::parent_not_indexed(path).into())
    }

    fn capture_metadata(&self, path: &Path) -> Result<CaptureMetadata> {
        self.metadata.get_metadata(path).map_err(|e| {
            IndexError::Metadata {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Delete `paths` deepest first. Paths not in the index are ignored.
    fn delete_paths<'a, I>(&self, paths: I) -> BatchReport
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut report = BatchReport::default();

        let mut canonical: Vec<PathBuf> = paths.into_iter().map(canonicalize_deleted).collect();
        canonical.sort_by(|a, b| {
            b.as_os_str()
                .len()
                .cmp(&a.as_os_str().len())
                .then_with(|| a.cmp(b))
        });
        canonical.dedup();

        for path in &canonical {
            let path_str = path.to_string_lossy();
            match self
                .db
                .with_transaction(|conn| delete_node_by_path(conn, &path_str))
            {
                Ok(true) => {
                    report.deleted += 1;
                    tracing::debug!(path = %path.display(), "Removed from index");
                }
                Ok(false) => {
                    tracing::trace!(path = %path.display(), "Not in index");
                }
                Err(e) => {
                    report.errors += 1;
                    log_item_failure(path, &e);
                }
            }
        }

        self.stats.record(&report);
        report
    }
}

impl FileChangeListener for IndexSynchronizer {
    fn name(&self) -> &str {
        "index-synchronizer"
    }

    fn on_files_updated(&self, updated: &HashSet<PathBuf>, deleted: &HashSet<PathBuf>) -> Result<()> {
        self.sync(updated, deleted).map(|_| ())
    }
}

impl std::fmt::Debug for IndexSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSynchronizer")
            .field("db", &self.db)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

fn log_item_failure(path: &Path, error: &Error) {
    match error {
        Error::Index(IndexError::Vanished { .. }) => {
            tracing::debug!(path = %path.display(), error = %error, "Path vanished, skipping");
        }
        _ => {
            tracing::error!(path = %path.display(), error = %error, "Failed to update index entry");
        }
    }
}

/// Canonical form of a path that may no longer exist.
///
/// The deepest existing ancestor is canonicalized and the missing tail
/// re-appended, so symlinked roots still match the stored paths.
fn canonicalize_deleted(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }

    let mut tail = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            tail.push(name.to_owned());
        }
        if let Ok(base) = parent.canonicalize() {
            return tail.iter().rev().fold(base, |acc, name| acc.join(name));
        }
        current = parent;
    }
    path.to_path_buf()
}
