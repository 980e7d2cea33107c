//! Size-stabilization debouncing for create/modify events.
//!
//! A file is only handed to listeners once its size has stayed the same for
//! a configured number of consecutive ticks, so files that are still being
//! copied or written are never indexed half-way. Directories are delivered
//! immediately together with every directory below them, and the files they
//! already hold start settling. Deletes skip the settle wait and go straight
//! to listeners.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use walkdir::WalkDir;

use super::listener::{FileChangeListener, Listeners};
use crate::error::WatcherError;
use crate::Result;

#[derive(Debug, Clone, Copy)]
struct Tracked {
    size: u64,
    stable_ticks: u32,
}

/// Holds changed paths until their size settles.
pub struct Debouncer {
    pending: Mutex<HashMap<PathBuf, Tracked>>,
    /// Serializes deliveries so batches never overlap.
    delivery: Mutex<()>,
    listeners: Listeners<dyn FileChangeListener>,
    stable_cycles: u32,
    interval: Duration,
}

impl Debouncer {
    /// Create a debouncer that delivers to `listeners`.
    #[must_use]
    pub fn new(
        interval: Duration,
        stable_cycles: u32,
        listeners: Vec<Arc<dyn FileChangeListener>>,
    ) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            delivery: Mutex::new(()),
            listeners: Listeners::new(listeners),
            stable_cycles,
            interval,
        }
    }

    /// Note that `path` may have changed.
    ///
    /// A directory is delivered right away together with all directories
    /// below it, and the files already inside start settling. Content that
    /// arrives with a moved-in or renamed directory raises no events of its
    /// own, so the subtree is read here. For files the current size is
    /// compared with the last observed one; a change resets the path's
    /// stable-tick counter. Counters only advance in `tick`.
    pub fn record(&self, path: &Path) {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                // Gone again before it settled; the delete event follows.
                tracing::trace!(path = %path.display(), error = %e, "Dropping unreadable path");
                self.pending.lock().remove(path);
                return;
            }
        };

        if metadata.is_dir() {
            self.record_tree(path);
            return;
        }

        track(&mut self.pending.lock(), path, metadata.len());
    }

    fn record_tree(&self, dir: &Path) {
        let mut directories = HashSet::from([dir.to_path_buf()]);
        {
            let mut pending = self.pending.lock();
            for entry in WalkDir::new(dir).follow_links(false).min_depth(1) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::debug!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                        continue;
                    }
                };
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    directories.insert(entry.into_path());
                } else if file_type.is_file() {
                    match entry.metadata() {
                        Ok(m) => track(&mut pending, entry.path(), m.len()),
                        Err(e) => {
                            tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                        }
                    }
                }
            }
        }

        if directories.len() > 1 {
            tracing::debug!(
                dir = %dir.display(),
                directories = directories.len(),
                "Directory arrived with content"
            );
        }
        self.deliver(directories);
    }

    /// Stop tracking `path` and anything below it.
    pub fn forget(&self, path: &Path) {
        self.pending.lock().retain(|p, _| !p.starts_with(path));
    }

    /// Forward deleted paths to listeners without waiting.
    ///
    /// Pending entries at or below each path are dropped first so a stale
    /// upsert cannot follow the delete.
    pub fn forward_deletes(&self, deleted: &HashSet<PathBuf>) {
        if deleted.is_empty() {
            return;
        }
        for path in deleted {
            self.forget(path);
        }
        let _delivery = self.delivery.lock();
        self.listeners.notify_files(&HashSet::new(), deleted);
    }

    /// Advance every counter and deliver the paths that reached the threshold.
    ///
    /// Returns the number of delivered paths.
    pub fn tick(&self) -> usize {
        let _delivery = self.delivery.lock();

        let ready: HashSet<PathBuf> = {
            let mut pending = self.pending.lock();
            let mut ready = HashSet::new();
            pending.retain(|path, tracked| {
                tracked.stable_ticks += 1;
                if tracked.stable_ticks >= self.stable_cycles {
                    ready.insert(path.clone());
                    false
                } else {
                    true
                }
            });
            ready
        };

        if ready.is_empty() {
            return 0;
        }

        tracing::debug!(
            stable = ready.len(),
            waiting = self.pending_count(),
            "Delivering stable paths"
        );
        self.listeners.notify_files(&ready, &HashSet::new());
        ready.len()
    }

    /// Number of paths waiting to settle.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn deliver(&self, paths: HashSet<PathBuf>) {
        let _delivery = self.delivery.lock();
        self.listeners.notify_files(&paths, &HashSet::new());
    }

    /// Start a thread that calls `tick` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start_ticker(self: &Arc<Self>) -> Result<Ticker> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let debouncer = Arc::clone(self);

        let handle = std::thread::Builder::new()
            .name("debounce-tick".to_string())
            .spawn(move || loop {
                match shutdown_rx.recv_timeout(debouncer.interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        debouncer.tick();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        tracing::debug!("Debounce ticker stopped");
                        break;
                    }
                }
            })
            .map_err(|e| WatcherError::Spawn(e.to_string()))?;

        Ok(Ticker {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

fn track(pending: &mut HashMap<PathBuf, Tracked>, path: &Path, size: u64) {
    match pending.get_mut(path) {
        Some(tracked) if tracked.size != size => {
            tracked.size = size;
            tracked.stable_ticks = 0;
        }
        Some(_) => {}
        None => {
            pending.insert(
                path.to_path_buf(),
                Tracked {
                    size,
                    stable_ticks: 0,
                },
            );
        }
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending", &self.pending_count())
            .field("stable_cycles", &self.stable_cycles)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Handle to a running ticker thread. Stops the thread when dropped.
#[derive(Debug)]
pub struct Ticker {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Signal the ticker and wait for an in-flight tick to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Debounce ticker panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Collect {
        batches: Mutex<Vec<HashSet<PathBuf>>>,
    }

    impl FileChangeListener for Collect {
        fn name(&self) -> &str {
            "collect"
        }

        fn on_files_updated(
            &self,
            updated: &HashSet<PathBuf>,
            _deleted: &HashSet<PathBuf>,
        ) -> Result<()> {
            self.batches.lock().push(updated.clone());
            Ok(())
        }
    }

    fn debouncer(stable_cycles: u32) -> (Debouncer, Arc<Collect>) {
        let collect = Arc::new(Collect::default());
        let debouncer = Debouncer::new(
            Duration::from_millis(10),
            stable_cycles,
            vec![collect.clone() as Arc<dyn FileChangeListener>],
        );
        (debouncer, collect)
    }

    fn write_size(path: &Path, size: usize) {
        std::fs::write(path, vec![b'x'; size]).unwrap();
    }

    #[test]
    fn test_stable_size_emits_once_at_threshold() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.jpg");
        let (debouncer, collect) = debouncer(2);

        write_size(&file, 10);
        debouncer.record(&file);
        assert_eq!(debouncer.tick(), 0);

        debouncer.record(&file);
        assert_eq!(debouncer.tick(), 1);

        // A later record starts a new settle episode.
        debouncer.record(&file);
        assert_eq!(debouncer.tick(), 0);
        assert_eq!(debouncer.pending_count(), 1);

        let batches = collect.batches.lock();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains(&file));
    }

    #[test]
    fn test_size_change_resets_counter() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("b.mp4");
        let (debouncer, collect) = debouncer(2);

        write_size(&file, 10);
        debouncer.record(&file);
        assert_eq!(debouncer.tick(), 0);

        write_size(&file, 20);
        debouncer.record(&file);
        assert_eq!(debouncer.tick(), 0);

        debouncer.record(&file);
        assert_eq!(debouncer.tick(), 1);

        assert_eq!(collect.batches.lock().len(), 1);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[test]
    fn test_growing_file_is_held() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("c.mov");
        let (debouncer, collect) = debouncer(2);

        for size in 1..6 {
            write_size(&file, size * 100);
            debouncer.record(&file);
            debouncer.tick();
        }

        assert!(collect.batches.lock().is_empty());
        assert_eq!(debouncer.pending_count(), 1);
    }

    #[test]
    fn test_directory_delivered_immediately() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("album");
        std::fs::create_dir(&dir).unwrap();
        let (debouncer, collect) = debouncer(3);

        debouncer.record(&dir);

        assert_eq!(*collect.batches.lock(), vec![HashSet::from([dir])]);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[test]
    fn test_populated_directory_delivers_subtree() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("import");
        let sub = dir.join("2023");
        std::fs::create_dir_all(&sub).unwrap();
        let top = dir.join("a.jpg");
        let deep = sub.join("b.jpg");
        write_size(&top, 5);
        write_size(&deep, 7);
        let (debouncer, collect) = debouncer(1);

        debouncer.record(&dir);

        assert_eq!(*collect.batches.lock(), vec![HashSet::from([dir, sub])]);
        assert_eq!(debouncer.pending_count(), 2);

        assert_eq!(debouncer.tick(), 2);
        let batches = collect.batches.lock();
        assert_eq!(batches[1], HashSet::from([top, deep]));
    }

    #[test]
    fn test_forget_drops_pending_subtree() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("album");
        std::fs::create_dir(&dir).unwrap();
        let inside = dir.join("a.jpg");
        let outside = tmp.path().join("b.jpg");
        write_size(&inside, 5);
        write_size(&outside, 5);

        let (debouncer, _collect) = debouncer(1);
        debouncer.record(&inside);
        debouncer.record(&outside);
        assert_eq!(debouncer.pending_count(), 2);

        debouncer.forget(&dir);
        assert_eq!(debouncer.pending_count(), 1);
    }

    #[test]
    fn test_forward_deletes_clears_pending() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("d.jpg");
        write_size(&file, 5);
        let (debouncer, collect) = debouncer(2);

        debouncer.record(&file);
        debouncer.forward_deletes(&HashSet::from([file.clone()]));

        assert_eq!(debouncer.pending_count(), 0);
        // Collect only keeps upserts; the delete batch has none.
        assert_eq!(*collect.batches.lock(), vec![HashSet::new()]);
    }

    #[test]
    fn test_vanished_path_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("gone.jpg");
        write_size(&file, 5);
        let (debouncer, _collect) = debouncer(2);

        debouncer.record(&file);
        std::fs::remove_file(&file).unwrap();
        debouncer.record(&file);

        assert_eq!(debouncer.pending_count(), 0);
    }

    #[test]
    fn test_ticker_delivers_and_stops() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("t.jpg");
        write_size(&file, 5);

        let (debouncer, collect) = debouncer(1);
        let debouncer = Arc::new(debouncer);
        let mut ticker = debouncer.start_ticker().unwrap();

        debouncer.record(&file);
        for _ in 0..100 {
            if !collect.batches.lock().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        ticker.stop();

        assert_eq!(collect.batches.lock().len(), 1);
    }
}
