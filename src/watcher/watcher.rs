//! Recursive file system watch over the current root directories.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use super::debouncer::Debouncer;
use super::events::EventBatch;
use crate::error::WatcherError;
use crate::Result;

/// A recursive watch over a fixed set of roots.
///
/// Creates and modifies go to the debouncer; deletes are forwarded at once on
/// the watch thread. Dropping the watch closes the event channel, which ends
/// the thread quietly.
pub struct TreeWatcher {
    watcher: Option<RecommendedWatcher>,
    handle: Option<JoinHandle<()>>,
    roots: Vec<PathBuf>,
}

impl TreeWatcher {
    /// Start watching `roots` recursively.
    ///
    /// A root that cannot be watched is logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watch or the watch thread cannot be created.
    pub fn start(roots: &[PathBuf], debouncer: Arc<Debouncer>) -> Result<Self> {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        })
        .map_err(|e| WatcherError::WatchFailed {
            path: "init".to_string(),
            reason: e.to_string(),
        })?;

        let mut watched = Vec::with_capacity(roots.len());
        for root in roots {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => {
                    tracing::info!(path = %root.display(), "Watching root directory");
                    watched.push(root.clone());
                }
                Err(e) => {
                    tracing::warn!(path = %root.display(), error = %e, "Cannot watch root directory");
                }
            }
        }

        let handle = std::thread::Builder::new()
            .name("fs-watch".to_string())
            .spawn(move || watch_loop(&event_rx, &debouncer))
            .map_err(|e| WatcherError::Spawn(e.to_string()))?;

        Ok(Self {
            watcher: Some(watcher),
            handle: Some(handle),
            roots: watched,
        })
    }

    /// Roots that are actually being watched.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Stop watching and wait for the watch thread to exit.
    pub fn close(&mut self) {
        // Dropping the OS watch drops the channel sender.
        drop(self.watcher.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("File watch thread panicked");
            }
        }
        if !self.roots.is_empty() {
            tracing::debug!(roots = self.roots.len(), "Root watch closed");
        }
    }
}

impl Drop for TreeWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TreeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWatcher")
            .field("roots", &self.roots)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn watch_loop(events: &Receiver<notify::Result<notify::Event>>, debouncer: &Debouncer) {
    for res in events {
        match res {
            Ok(event) => route(&EventBatch::from_notify(&event), debouncer),
            Err(e) => {
                tracing::error!(error = %e, "File watch failed, watch loop terminating");
                return;
            }
        }
    }
    tracing::debug!("File watch loop exited");
}

fn route(batch: &EventBatch, debouncer: &Debouncer) {
    for path in &batch.modified {
        debouncer.record(path);
    }

    if !batch.deleted.is_empty() {
        let deleted: HashSet<PathBuf> = batch.deleted.iter().cloned().collect();
        debouncer.forward_deletes(&deleted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::{FileChangeListener, FileEvent};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Collect {
        deleted: Mutex<Vec<PathBuf>>,
    }

    impl FileChangeListener for Collect {
        fn name(&self) -> &str {
            "collect"
        }

        fn on_files_updated(&self, _: &HashSet<PathBuf>, deleted: &HashSet<PathBuf>) -> Result<()> {
            self.deleted.lock().extend(deleted.iter().cloned());
            Ok(())
        }
    }

    #[test]
    fn test_route_records_and_forwards_deletes() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.jpg");
        std::fs::write(&file, b"x").unwrap();

        let collect = Arc::new(Collect::default());
        let debouncer = Debouncer::new(
            Duration::from_millis(10),
            2,
            vec![collect.clone() as Arc<dyn FileChangeListener>],
        );

        let mut batch = EventBatch::new();
        batch.add(FileEvent::Modified(file.clone()));
        batch.add(FileEvent::Deleted(tmp.path().join("b.jpg")));
        route(&batch, &debouncer);

        assert_eq!(debouncer.pending_count(), 1);
        assert_eq!(*collect.deleted.lock(), vec![tmp.path().join("b.jpg")]);
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(10), 2, Vec::new()));

        let mut watcher = TreeWatcher::start(
            &[tmp.path().to_path_buf(), tmp.path().join("missing")],
            debouncer,
        )
        .unwrap();

        assert_eq!(watcher.roots(), &[tmp.path().to_path_buf()]);
        watcher.close();
    }
}
