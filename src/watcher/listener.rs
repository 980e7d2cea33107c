//! Listener traits and fan-out helpers.
//!
//! Components that produce batches own an explicit list of listeners handed
//! to them at construction. Notification iterates over a snapshot of that
//! list, and a failing listener is logged without stopping the others.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::RootDirectory;
use crate::Result;

/// Receives settled create/modify batches and delete batches.
pub trait FileChangeListener: Send + Sync {
    /// Listener name for logging.
    fn name(&self) -> &str;

    /// Handle a batch. At least one of the two sets is non-empty.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller; they never stop other listeners.
    fn on_files_updated(&self, updated: &HashSet<PathBuf>, deleted: &HashSet<PathBuf>)
        -> Result<()>;
}

/// Receives the complete root set every time it is (re)loaded.
pub trait RootDirectoriesListener: Send + Sync {
    /// Listener name for logging.
    fn name(&self) -> &str;

    /// Replace the listener's view of the root set with `roots`.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller; they never stop other listeners.
    fn on_root_directories_updated(&self, roots: &[RootDirectory]) -> Result<()>;
}

/// A registry of listeners that is safe to notify while it is being modified.
pub struct Listeners<L: ?Sized> {
    inner: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> Listeners<L> {
    /// Create a registry from an initial list.
    #[must_use]
    pub fn new(listeners: Vec<Arc<L>>) -> Self {
        Self {
            inner: RwLock::new(listeners),
        }
    }

    /// Register another listener.
    pub fn add(&self, listener: Arc<L>) {
        self.inner.write().push(listener);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copy of the current list; the lock is released before the copy is used.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.inner.read().clone()
    }
}

impl Listeners<dyn FileChangeListener> {
    /// Deliver a batch to every listener. Returns the number of listeners that failed.
    pub fn notify_files(&self, updated: &HashSet<PathBuf>, deleted: &HashSet<PathBuf>) -> usize {
        if updated.is_empty() && deleted.is_empty() {
            return 0;
        }

        let mut failures = 0;
        for listener in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_files_updated(updated, deleted))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::error!(
                        listener = listener.name(),
                        updated = updated.len(),
                        deleted = deleted.len(),
                        error = %e,
                        "File change listener failed"
                    );
                }
                Err(panic) => {
                    failures += 1;
                    tracing::error!(
                        listener = listener.name(),
                        updated = updated.len(),
                        deleted = deleted.len(),
                        panic = panic_message(panic.as_ref()),
                        "File change listener panicked"
                    );
                }
            }
        }
        failures
    }
}

impl Listeners<dyn RootDirectoriesListener> {
    /// Publish the full root set to every listener. Returns the number of listeners that failed.
    pub fn notify_roots(&self, roots: &[RootDirectory]) -> usize {
        let mut failures = 0;
        for listener in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_root_directories_updated(roots))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::error!(
                        listener = listener.name(),
                        roots = roots.len(),
                        error = %e,
                        "Root directories listener failed"
                    );
                }
                Err(panic) => {
                    failures += 1;
                    tracing::error!(
                        listener = listener.name(),
                        roots = roots.len(),
                        panic = panic_message(panic.as_ref()),
                        "Root directories listener panicked"
                    );
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
