//! Database schema definitions and migrations.
//!
//! Provides versioned schema migrations for safe database upgrades.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

const TABLES: [&str; 4] = ["location", "node", "filename_part", "tag"];

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current_version = get_current_version(conn)?;
    tracing::info!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking database migrations"
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn get_current_version(conn: &Connection) -> Result<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::Migration(format!("failed to get version: {e}")).into())
}

fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        rusqlite::params![version, chrono::Utc::now().timestamp()],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;

    Ok(())
}

/// Migration v1: hierarchical node index with tags and filename tokens.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: initial schema");

    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS location (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            country_name TEXT,
            country_code TEXT,
            admin_area TEXT,
            feature_code TEXT,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_location_lat_lon ON location(latitude, longitude);

        -- parent_id is NULL only for configured root directories
        CREATE TABLE IF NOT EXISTS node (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER REFERENCES node(id) ON DELETE CASCADE,
            path TEXT NOT NULL UNIQUE,
            is_directory INTEGER NOT NULL,
            file_type TEXT CHECK (file_type IN ('IMAGE', 'VIDEO')),
            content_type TEXT,
            latitude REAL,
            longitude REAL,
            nearest_location_id INTEGER REFERENCES location(id) ON DELETE CASCADE,
            date_taken INTEGER,
            last_modified INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_node_parent ON node(parent_id);
        CREATE INDEX IF NOT EXISTS idx_node_file_type ON node(file_type);
        CREATE INDEX IF NOT EXISTS idx_node_nearest_location ON node(nearest_location_id);

        CREATE TABLE IF NOT EXISTS filename_part (
            node_id INTEGER NOT NULL REFERENCES node(id) ON DELETE CASCADE,
            part_index INTEGER NOT NULL,
            part TEXT NOT NULL,
            PRIMARY KEY (node_id, part_index)
        );

        CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            node_id INTEGER NOT NULL REFERENCES node(id) ON DELETE CASCADE,
            text TEXT NOT NULL COLLATE NOCASE,
            source TEXT NOT NULL CHECK (source IN ('FILENAME', 'LOCATION'))
        );

        CREATE INDEX IF NOT EXISTS idx_tag_node_source ON tag(node_id, source);
        CREATE INDEX IF NOT EXISTS idx_tag_text ON tag(text);
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, 1)?;
    tracing::info!("Migration v1 complete");

    Ok(())
}

/// Verify all expected tables exist.
///
/// # Errors
///
/// Returns an error if any expected table is missing from the schema.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for table in TABLES {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !exists {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}
