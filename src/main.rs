//! Gallery Sync - media index synchronizer
//!
//! Entry point for the gallery-sync service.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gallery_sync::observability::{init_tracing, TracingConfig};
use gallery_sync::services::{AuthorizationOracle, RootRegistry};
use gallery_sync::storage::{init_storage, Database};
use gallery_sync::watcher::{
    Debouncer, FileChangeListener, IndexSynchronizer, MediaFilter, RebuildMode,
    RootDirectoriesListener, RootSetWatcher,
};
use gallery_sync::{Config, Error, Result};
use tokio::signal;

/// Gallery Sync - keeps the media index in step with the watched roots
#[derive(Parser, Debug)]
#[command(name = "gallery-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory for `SQLite` database
    #[arg(short, long, env = "GALLERY_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Roots file with `ROLE.name=/directory` entries
    #[arg(short, long, env = "GALLERY_ROOTS_FILE", default_value = "./roots.properties")]
    roots_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GALLERY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "GALLERY_LOG_JSON")]
    log_json: bool,

    /// File extensions to index
    #[arg(short, long, env = "GALLERY_EXTENSIONS", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Milliseconds between size-stabilization ticks
    #[arg(long, env = "GALLERY_DEBOUNCE_MS", default_value = "500")]
    debounce_ms: u64,

    /// Unchanged-size ticks before a file is indexed
    #[arg(long, env = "GALLERY_STABLE_CYCLES", default_value = "3")]
    stable_cycles: u32,

    /// Skip the incremental rebuild at startup
    #[arg(long, env = "GALLERY_NO_REBUILD")]
    no_rebuild: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config {
            data_dir: self.data_dir,
            roots_file: self.roots_file,
            log_level: self.log_level,
            log_json: self.log_json,
            debounce_interval: Duration::from_millis(self.debounce_ms),
            stable_cycles: self.stable_cycles,
            rebuild_on_start: !self.no_rebuild,
            ..Config::default()
        };
        if !self.extensions.is_empty() {
            config.allowed_extensions = Config::parse_extensions(&self.extensions.join(","));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config();

    init_tracing(&TracingConfig::from(&config));

    tracing::info!(
        "Gallery Sync v{} starting...",
        env!("CARGO_PKG_VERSION")
    );
    tracing::debug!(?config, "Configuration loaded");

    config.validate()?;

    let db = Database::open(config.database_path())?;
    init_storage(&db)?;

    let registry = Arc::new(RootRegistry::new());
    let synchronizer = Arc::new(IndexSynchronizer::new(
        db,
        MediaFilter::new(&config.allowed_extensions),
        Arc::clone(&registry) as Arc<dyn AuthorizationOracle>,
    ));

    let debouncer = Arc::new(Debouncer::new(
        config.debounce_interval,
        config.stable_cycles,
        vec![Arc::clone(&synchronizer) as Arc<dyn FileChangeListener>],
    ));

    let mut root_watcher = RootSetWatcher::new(
        &config.roots_file,
        vec![registry as Arc<dyn RootDirectoriesListener>],
        debouncer,
    )
    .with_indexer(Arc::clone(&synchronizer));
    root_watcher.set_up()?;

    if config.rebuild_on_start {
        let synchronizer = Arc::clone(&synchronizer);
        std::thread::Builder::new()
            .name("rebuild".to_string())
            .spawn(move || {
                if let Err(e) = synchronizer.rebuild(RebuildMode::Incremental) {
                    tracing::error!(error = %e, "Startup rebuild failed");
                }
            })
            .map_err(|e| Error::internal(format!("cannot start rebuild: {e}")))?;
    }

    shutdown_signal().await;

    root_watcher.shutdown();

    let totals = synchronizer.stats().snapshot();
    tracing::info!(
        upserted = totals.upserted,
        skipped = totals.skipped,
        deleted = totals.deleted,
        errors = totals.errors,
        "Gallery Sync shut down"
    );
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
