//! Structured logging setup.
//!
//! Everything logs through `tracing`. The binary installs a subscriber once at
//! startup; `RUST_LOG` overrides the configured level.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl From<&crate::Config> for TracingConfig {
    fn from(config: &crate::Config) -> Self {
        Self {
            level: config.log_level.clone(),
            json: config.log_json,
        }
    }
}

/// Install the global tracing subscriber.
///
/// Output is plain text or JSON lines, with target, thread and source location.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed in this process.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
}

/// Spans wrapped around background work.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span for one upsert or delete batch.
    #[must_use]
    pub fn batch_span(kind: &'static str, size: usize) -> Span {
        info_span!("batch", kind = kind, size = size)
    }

    /// Span for a full rebuild over `roots` root directories.
    #[must_use]
    pub fn rebuild_span(roots: usize) -> Span {
        info_span!("rebuild", roots = roots)
    }

    /// Span for a root-set reload.
    #[must_use]
    pub fn reload_span(config_file: &std::path::Path) -> Span {
        info_span!("reload_roots", file = %config_file.display())
    }
}
