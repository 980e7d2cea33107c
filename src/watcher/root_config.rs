//! Watches the roots file and keeps the recursive watch in step with it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use super::debouncer::{Debouncer, Ticker};
use super::indexer::{IndexSynchronizer, RebuildMode};
use super::listener::{Listeners, RootDirectoriesListener};
use super::watcher::TreeWatcher;
use crate::config::{load_root_directories, RootDirectory};
use crate::error::WatcherError;
use crate::observability::spans;
use crate::Result;

struct Inner {
    config_file: PathBuf,
    root_listeners: Listeners<dyn RootDirectoriesListener>,
    debouncer: Arc<Debouncer>,
    tree: Mutex<Option<TreeWatcher>>,
    current: Mutex<Vec<RootDirectory>>,
    indexer: Mutex<Option<Arc<IndexSynchronizer>>>,
}

impl Inner {
    /// Re-read the roots file and apply it. With `catch_up`, content already
    /// present under the new set is indexed once the watch is in place.
    fn reload(&self, catch_up: bool) -> Result<usize> {
        let roots = load_root_directories(&self.config_file)?;
        let count = self.apply(roots)?;
        if catch_up {
            self.catch_up();
        }
        Ok(count)
    }

    /// Publish `roots` and swap the recursive watch over to them.
    fn apply(&self, roots: Vec<RootDirectory>) -> Result<usize> {
        let mut tree = self.tree.lock();
        if let Some(mut old) = tree.take() {
            old.close();
        }

        let failures = self.root_listeners.notify_roots(&roots);
        let dirs: Vec<PathBuf> = roots.iter().map(|r| r.directory.clone()).collect();
        let count = roots.len();
        // Listeners have seen this set; `current` must agree with them.
        *self.current.lock() = roots;

        match TreeWatcher::start(&dirs, Arc::clone(&self.debouncer)) {
            Ok(watcher) => *tree = Some(watcher),
            Err(e) => {
                tracing::error!(roots = count, error = %e, "Root directories published but not watched");
                return Err(e);
            }
        }

        tracing::info!(
            roots = count,
            listener_failures = failures,
            "Root directories loaded"
        );
        Ok(count)
    }

    fn catch_up(&self) {
        let Some(indexer) = self.indexer.lock().clone() else {
            return;
        };
        match indexer.rebuild(RebuildMode::Incremental) {
            Ok(report) => tracing::info!(
                upserted = report.upserted,
                skipped = report.skipped,
                errors = report.errors,
                "Indexed existing content of reloaded roots"
            ),
            Err(e) => tracing::error!(error = %e, "Catch-up rebuild after reload failed"),
        }
    }
}

/// Owns the root set: loads it, publishes it, watches it, and watches for edits.
///
/// `set_up` moves the watcher from stopped to watching; `shutdown` (or drop)
/// moves it back. A reload that fails keeps the previous set in force.
pub struct RootSetWatcher {
    inner: Arc<Inner>,
    config_watcher: Option<RecommendedWatcher>,
    config_thread: Option<JoinHandle<()>>,
    ticker: Option<Ticker>,
}

impl RootSetWatcher {
    /// Create a stopped watcher for `config_file`.
    #[must_use]
    pub fn new(
        config_file: impl Into<PathBuf>,
        root_listeners: Vec<Arc<dyn RootDirectoriesListener>>,
        debouncer: Arc<Debouncer>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config_file: config_file.into(),
                root_listeners: Listeners::new(root_listeners),
                debouncer,
                tree: Mutex::new(None),
                current: Mutex::new(Vec::new()),
                indexer: Mutex::new(None),
            }),
            config_watcher: None,
            config_thread: None,
            ticker: None,
        }
    }

    /// Run an incremental rebuild through `indexer` after every reload, so
    /// files that already sit in a newly added root get indexed.
    #[must_use]
    pub fn with_indexer(self, indexer: Arc<IndexSynchronizer>) -> Self {
        *self.inner.indexer.lock() = Some(indexer);
        self
    }

    /// Load the roots, start watching them, and start watching the roots file.
    ///
    /// Calling this again restarts everything from the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the roots file cannot be read or a watch cannot be
    /// created.
    pub fn set_up(&mut self) -> Result<()> {
        self.shutdown();

        let _span = spans::reload_span(&self.inner.config_file).entered();
        self.inner.reload(false)?;
        self.ticker = Some(self.inner.debouncer.start_ticker()?);

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        })
        .map_err(|e| WatcherError::WatchFailed {
            path: self.inner.config_file.display().to_string(),
            reason: e.to_string(),
        })?;

        let dir = config_dir(&self.inner.config_file);
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;

        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name("config-watch".to_string())
            .spawn(move || config_loop(&event_rx, &inner))
            .map_err(|e| WatcherError::Spawn(e.to_string()))?;

        self.config_watcher = Some(watcher);
        self.config_thread = Some(handle);
        tracing::info!(file = %self.inner.config_file.display(), "Watching roots file");
        Ok(())
    }

    /// Re-read the roots file now, then catch the index up if an indexer is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read; the previous set stays in
    /// force. Also returns an error if the new set is published but its watch
    /// cannot be created.
    pub fn reload(&self) -> Result<usize> {
        let _span = spans::reload_span(&self.inner.config_file).entered();
        self.inner.reload(true)
    }

    /// The root set currently in force.
    #[must_use]
    pub fn roots(&self) -> Vec<RootDirectory> {
        self.inner.current.lock().clone()
    }

    /// Directories the recursive watch actually covers.
    #[must_use]
    pub fn watched_directories(&self) -> Vec<PathBuf> {
        self.inner
            .tree
            .lock()
            .as_ref()
            .map(|t| t.roots().to_vec())
            .unwrap_or_default()
    }

    /// Whether `set_up` has completed and `shutdown` has not been called.
    #[must_use]
    pub const fn is_watching(&self) -> bool {
        self.config_watcher.is_some()
    }

    /// Stop every watch and background thread.
    pub fn shutdown(&mut self) {
        let was_watching = self.is_watching();

        drop(self.config_watcher.take());
        if let Some(handle) = self.config_thread.take() {
            if handle.join().is_err() {
                tracing::error!("Roots file watch thread panicked");
            }
        }

        if let Some(mut tree) = self.inner.tree.lock().take() {
            tree.close();
        }

        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }

        if was_watching {
            tracing::info!("Root watch shut down");
        }
    }
}

impl Drop for RootSetWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RootSetWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootSetWatcher")
            .field("config_file", &self.inner.config_file)
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

fn config_dir(config_file: &Path) -> &Path {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn config_loop(events: &Receiver<notify::Result<notify::Event>>, inner: &Inner) {
    let Some(file_name) = inner.config_file.file_name().map(ToOwned::to_owned) else {
        tracing::error!(file = %inner.config_file.display(), "Roots file has no file name");
        return;
    };

    for res in events {
        match res {
            Ok(event) if touches_config(&event, &file_name) => {
                let _span = spans::reload_span(&inner.config_file).entered();
                if let Err(e) = inner.reload(true) {
                    tracing::warn!(error = %e, "Roots file reload failed, keeping previous roots");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Roots file watch failed, watch loop terminating");
                return;
            }
        }
    }
}

fn touches_config(event: &notify::Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
