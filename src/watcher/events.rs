//! File system event types and classification of raw `notify` events.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;

/// File system event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Path was created or modified.
    Modified(PathBuf),
    /// Path was deleted.
    Deleted(PathBuf),
    /// Path was renamed from old path to new path.
    Renamed { from: PathBuf, to: PathBuf },
}

impl FileEvent {
    /// Get the primary path associated with this event.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Modified(p) | Self::Deleted(p) => p,
            Self::Renamed { to, .. } => to,
        }
    }

    /// Translate one raw `notify` event.
    ///
    /// Access and "other" events carry no content change and yield nothing.
    #[must_use]
    pub fn classify(event: &notify::Event) -> Vec<Self> {
        match &event.kind {
            EventKind::Create(_) | EventKind::Any => {
                event.paths.iter().cloned().map(Self::Modified).collect()
            }
            EventKind::Remove(_) => event.paths.iter().cloned().map(Self::Deleted).collect(),
            EventKind::Modify(ModifyKind::Name(mode)) => classify_rename(*mode, &event.paths),
            EventKind::Modify(_) => event.paths.iter().cloned().map(Self::Modified).collect(),
            EventKind::Access(_) | EventKind::Other => Vec::new(),
        }
    }
}

fn classify_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<FileEvent> {
    match (mode, paths) {
        (RenameMode::Both, [from, to]) => vec![FileEvent::Renamed {
            from: from.clone(),
            to: to.clone(),
        }],
        (RenameMode::From, _) => paths.iter().cloned().map(FileEvent::Deleted).collect(),
        (RenameMode::To, _) => paths.iter().cloned().map(FileEvent::Modified).collect(),
        // Direction unknown: whichever side still exists was the target.
        _ => paths
            .iter()
            .map(|p| {
                if p.exists() {
                    FileEvent::Modified(p.clone())
                } else {
                    FileEvent::Deleted(p.clone())
                }
            })
            .collect(),
    }
}

/// Batch of file events for processing.
#[derive(Debug, Default)]
pub struct EventBatch {
    /// Created or modified paths, to be stabilized then upserted.
    pub modified: Vec<PathBuf>,
    /// Deleted paths, forwarded immediately.
    pub deleted: Vec<PathBuf>,
}

impl EventBatch {
    /// Create a new empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold every event of a raw `notify` event into a new batch.
    #[must_use]
    pub fn from_notify(event: &notify::Event) -> Self {
        let mut batch = Self::new();
        for file_event in FileEvent::classify(event) {
            batch.add(file_event);
        }
        batch
    }

    /// Add an event to the batch.
    pub fn add(&mut self, event: FileEvent) {
        match event {
            FileEvent::Modified(path) => {
                self.deleted.retain(|p| p != &path);
                if !self.modified.contains(&path) {
                    self.modified.push(path);
                }
            }
            FileEvent::Deleted(path) => {
                self.modified.retain(|p| p != &path);
                if !self.deleted.contains(&path) {
                    self.deleted.push(path);
                }
            }
            FileEvent::Renamed { from, to } => {
                self.add(FileEvent::Deleted(from));
                self.add(FileEvent::Modified(to));
            }
        }
    }

    /// Check if batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Get total number of paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modified.len() + self.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};
    use notify::Event;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_classify_create_and_modify() {
        let created = FileEvent::classify(&event(EventKind::Create(CreateKind::File), &["/a.jpg"]));
        assert_eq!(created, vec![FileEvent::Modified(PathBuf::from("/a.jpg"))]);

        let written = FileEvent::classify(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/a.jpg"],
        ));
        assert_eq!(written, vec![FileEvent::Modified(PathBuf::from("/a.jpg"))]);
    }

    #[test]
    fn test_classify_remove() {
        let removed = FileEvent::classify(&event(EventKind::Remove(RemoveKind::Any), &["/a.jpg"]));
        assert_eq!(removed, vec![FileEvent::Deleted(PathBuf::from("/a.jpg"))]);
    }

    #[test]
    fn test_classify_ignores_access() {
        let accessed = FileEvent::classify(&event(EventKind::Access(AccessKind::Any), &["/a.jpg"]));
        assert!(accessed.is_empty());
        assert!(FileEvent::classify(&event(EventKind::Other, &["/a.jpg"])).is_empty());
    }

    #[test]
    fn test_rename_both_becomes_delete_and_modify() {
        let batch = EventBatch::from_notify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/old.jpg", "/new.jpg"],
        ));
        assert_eq!(batch.modified, vec![PathBuf::from("/new.jpg")]);
        assert_eq!(batch.deleted, vec![PathBuf::from("/old.jpg")]);
    }

    #[test]
    fn test_rename_from_is_delete() {
        let events = FileEvent::classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/old.jpg"],
        ));
        assert_eq!(events, vec![FileEvent::Deleted(PathBuf::from("/old.jpg"))]);
    }

    #[test]
    fn test_batch_dedupes_and_delete_cancels_modify() {
        let mut batch = EventBatch::new();
        batch.add(FileEvent::Modified(PathBuf::from("/a.jpg")));
        batch.add(FileEvent::Modified(PathBuf::from("/a.jpg")));
        batch.add(FileEvent::Modified(PathBuf::from("/b.jpg")));
        assert_eq!(batch.modified.len(), 2);

        batch.add(FileEvent::Deleted(PathBuf::from("/a.jpg")));
        assert_eq!(batch.modified, vec![PathBuf::from("/b.jpg")]);
        assert_eq!(batch.deleted, vec![PathBuf::from("/a.jpg")]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_recreate_after_delete() {
        let mut batch = EventBatch::new();
        batch.add(FileEvent::Deleted(PathBuf::from("/a.jpg")));
        batch.add(FileEvent::Modified(PathBuf::from("/a.jpg")));
        assert!(batch.deleted.is_empty());
        assert_eq!(batch.modified, vec![PathBuf::from("/a.jpg")]);
    }
}
