//! `SQLite` storage for the gallery index.
//!
//! This module provides persistent storage for:
//! - Index nodes (files and directories, one per canonical path)
//! - Filename tokens and search tags
//! - Named locations used for nearest-location tagging

mod connection;
mod locations;
mod models;
mod nodes;
mod schema;
mod tags;

pub use connection::Database;
pub use locations::{find_locations_in_window, get_location, insert_location};
pub use models::{
    from_millis, to_millis, FileType, GeoPoint, IndexNode, Location, NodeUpsert, Tag, TagSource,
};
pub use nodes::{
    count_nodes, delete_node_by_path, find_node_id_by_path, find_nodes_by_file_type,
    get_node_by_path, merge_node, node_is_current,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use tags::{
    find_node_ids_by_tag, get_filename_parts, list_tags, replace_filename_parts, replace_tags,
};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
