//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Extensions indexed when no explicit list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "mp4", "mov", "avi", "mkv", "webm", "m4v",
];

/// Main configuration for the gallery sync service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` database.
    pub data_dir: PathBuf,

    /// Properties file listing `ROLE.name=/directory` root entries.
    pub roots_file: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// File extensions (without dot, lowercase) that are indexed.
    pub allowed_extensions: Vec<String>,

    /// Interval between stabilization ticks.
    pub debounce_interval: Duration,

    /// Consecutive unchanged-size ticks before a path is delivered.
    pub stable_cycles: u32,

    /// Run a full rebuild after the first root set is loaded.
    pub rebuild_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            roots_file: PathBuf::from("./roots.properties"),
            log_level: "info".to_string(),
            log_json: false,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            debounce_interval: Duration::from_millis(500),
            stable_cycles: 3,
            rebuild_on_start: true,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.stable_cycles == 0 {
            return Err(Error::config("stable_cycles cannot be 0"));
        }

        if self.debounce_interval.is_zero() {
            return Err(Error::config("debounce_interval cannot be 0"));
        }

        if self.allowed_extensions.is_empty() {
            return Err(Error::config("allowed_extensions cannot be empty"));
        }

        if self.roots_file.as_os_str().is_empty() {
            return Err(Error::config("roots_file cannot be empty"));
        }

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("gallery.db")
    }

    /// Parse a comma separated extension list, dropping dots and blanks.
    #[must_use]
    pub fn parse_extensions(list: &str) -> Vec<String> {
        list.split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}
