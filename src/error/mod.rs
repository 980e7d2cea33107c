//! Error types and Result aliases for gallery-sync.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gallery-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Failure while indexing a single path.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Root directory config file could not be read or parsed.
    #[error("failed to load root config '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Background thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(String),
}

/// Per-path indexing failures. These never abort a batch.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The parent directory of a node has no row in the index.
    #[error("parent of '{path}' is not indexed")]
    ParentNotIndexed { path: String },

    /// The path disappeared before it could be processed.
    #[error("'{path}' no longer exists")]
    Vanished { path: String },

    /// No content type could be determined.
    #[error("could not determine content type of '{path}'")]
    ContentType { path: String },

    /// Metadata extraction failed.
    #[error("metadata extraction failed for '{path}': {reason}")]
    Metadata { path: String, reason: String },

    /// Nearest-location lookup failed.
    #[error("location lookup failed: {0}")]
    Location(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl IndexError {
    /// Create a parent-not-indexed error for a path.
    pub fn parent_not_indexed(path: &std::path::Path) -> Self {
        Self::ParentNotIndexed {
            path: path.display().to_string(),
        }
    }

    /// Create a vanished-path error.
    pub fn vanished(path: &std::path::Path) -> Self {
        Self::Vanished {
            path: path.display().to_string(),
        }
    }
}
