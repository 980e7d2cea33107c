//! File system watching and index synchronization.
//!
//! This module provides:
//! - Root set loading and live reload from the roots file
//! - Recursive directory watching using notify-rs
//! - Size-stabilization debouncing of create/modify events
//! - Synchronization of settled batches into the gallery index

mod debouncer;
mod events;
mod filter;
mod indexer;
mod listener;
mod root_config;
mod scanner;
mod stats;
mod tokenizer;
#[allow(clippy::module_inception)]
mod watcher;

pub use debouncer::{Debouncer, Ticker};
pub use events::{EventBatch, FileEvent};
pub use filter::MediaFilter;
pub use indexer::{IndexSynchronizer, RebuildMode};
pub use listener::{FileChangeListener, Listeners, RootDirectoriesListener};
pub use root_config::RootSetWatcher;
pub use scanner::{scan_roots, ScanStatsSnapshot};
pub use stats::{BatchReport, SyncStats, UpsertOutcome};
pub use tokenizer::{distinct_tokens, filename_tokens};
pub use watcher::TreeWatcher;
