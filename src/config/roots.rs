//! Root directory configuration.
//!
//! The roots file is a flat properties file where every key has the shape
//! `ROLE.name` and the value is the real directory exposed under that name:
//!
//! ```text
//! # comment
//! ROLE_A.family=/data/family
//! ROLE_A.work = /data/work
//! ```
//!
//! Keys that do not split into exactly two `.`-separated segments are skipped.

use crate::error::WatcherError;
use crate::Result;
use std::path::{Path, PathBuf};

/// A real directory exposed under a name, gated by a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootDirectory {
    /// Role required to see this root.
    pub role: String,
    /// Public name of the root (first segment of a public path).
    pub name: String,
    /// Real directory on disk.
    pub directory: PathBuf,
}

impl RootDirectory {
    /// Create a root directory entry.
    pub fn new(role: impl Into<String>, name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
            directory: directory.into(),
        }
    }
}

/// Parse roots file contents.
///
/// Entries keep file order. A repeated key replaces the earlier entry in place.
#[must_use]
pub fn parse_root_config(text: &str) -> Vec<RootDirectory> {
    let mut roots: Vec<RootDirectory> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some((key, value)) = split_property(line) else {
            tracing::debug!(line = %line, "Skipping roots entry without a value");
            continue;
        };

        let segments: Vec<&str> = key.split('.').collect();
        let [role, name] = segments.as_slice() else {
            tracing::debug!(key = %key, "Skipping roots entry with malformed key");
            continue;
        };

        let entry = RootDirectory::new(*role, *name, value);
        match roots
            .iter_mut()
            .find(|r| r.role == entry.role && r.name == entry.name)
        {
            Some(existing) => *existing = entry,
            None => roots.push(entry),
        }
    }

    roots
}

/// Split a properties line into key and value.
///
/// The key ends at the first `=`, `:` or whitespace. Whitespace after it and
/// one `=` or `:` are skipped, so `key value`, `key=value` and `key : value`
/// all split the same way. A line without a value yields `None`.
fn split_property(line: &str) -> Option<(&str, &str)> {
    let end = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace())?;
    let key = &line[..end];
    let rest = line[end..].trim_start();
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    let value = rest.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Read and parse the roots file at `path`.
///
/// # Errors
///
/// Returns `WatcherError::ConfigLoad` if the file cannot be read.
pub fn load_root_directories(path: &Path) -> Result<Vec<RootDirectory>> {
    let text = std::fs::read_to_string(path).map_err(|e| WatcherError::ConfigLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(parse_root_config(&text))
}
