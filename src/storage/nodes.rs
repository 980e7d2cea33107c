//! Node storage: merge-by-path, lookups and cascading delete.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use super::models::{from_millis, to_millis, FileType, GeoPoint, IndexNode, NodeUpsert};
use crate::error::StorageError;
use crate::Result;

const NODE_COLUMNS: &str = "id, parent_id, path, is_directory, file_type, content_type, \
                            latitude, longitude, nearest_location_id, date_taken, last_modified";

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<IndexNode> {
    let file_type = row
        .get::<_, Option<String>>(4)?
        .map(|s| {
            s.parse::<FileType>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))
        })
        .transpose()?;

    let latitude: Option<f64> = row.get(6)?;
    let longitude: Option<f64> = row.get(7)?;
    let location = latitude
        .zip(longitude)
        .map(|(lat, lon)| GeoPoint::new(lat, lon));

    Ok(IndexNode {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        path: row.get(2)?,
        is_directory: row.get(3)?,
        file_type,
        content_type: row.get(5)?,
        location,
        nearest_location_id: row.get(8)?,
        date_taken: row.get::<_, Option<i64>>(9)?.map(from_millis),
        last_modified: from_millis(row.get(10)?),
    })
}

/// Insert a node or update the existing row with the same path.
///
/// The row id is preserved on update, so children and tags stay attached.
/// Returns the node id.
///
/// # Errors
///
/// Returns an error if the statement fails (for example an unknown `parent_id`).
pub fn merge_node(conn: &Connection, node: &NodeUpsert) -> Result<i64> {
    let id = conn
        .query_row(
            "INSERT INTO node (parent_id, path, is_directory, file_type, content_type, \
             latitude, longitude, nearest_location_id, date_taken, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(path) DO UPDATE SET
                parent_id = excluded.parent_id,
                is_directory = excluded.is_directory,
                file_type = excluded.file_type,
                content_type = excluded.content_type,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                nearest_location_id = excluded.nearest_location_id,
                date_taken = excluded.date_taken,
                last_modified = excluded.last_modified
             RETURNING id",
            params![
                node.parent_id,
                node.path,
                node.is_directory,
                node.file_type.map(FileType::as_str),
                node.content_type,
                node.location.map(|p| p.latitude),
                node.location.map(|p| p.longitude),
                node.nearest_location_id,
                node.date_taken.map(to_millis),
                to_millis(node.last_modified),
            ],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::Database(format!("failed to merge node '{}': {e}", node.path)))?;

    Ok(id)
}

/// Look up the id of the node stored for `path`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_node_id_by_path(conn: &Connection, path: &str) -> Result<Option<i64>> {
    let result = conn.query_row("SELECT id FROM node WHERE path = ?", [path], |row| {
        row.get(0)
    });

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Database(e.to_string()).into()),
    }
}

/// Get the full node stored for `path`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_node_by_path(conn: &Connection, path: &str) -> Result<Option<IndexNode>> {
    let sql = format!("SELECT {NODE_COLUMNS} FROM node WHERE path = ?");
    let result = conn.query_row(&sql, [path], row_to_node);

    match result {
        Ok(node) => Ok(Some(node)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Database(e.to_string()).into()),
    }
}

/// Whether the stored row for `path` is at least as new as `last_modified`.
///
/// A missing row is never current.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn node_is_current(conn: &Connection, path: &str, last_modified: DateTime<Utc>) -> Result<bool> {
    let result = conn.query_row(
        "SELECT last_modified FROM node WHERE path = ?",
        [path],
        |row| row.get::<_, i64>(0),
    );

    match result {
        Ok(stored) => Ok(stored >= to_millis(last_modified)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(StorageError::Database(e.to_string()).into()),
    }
}

/// Delete the node for `path`; descendants, tags and filename parts cascade.
///
/// Returns `false` when no row matched.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_node_by_path(conn: &Connection, path: &str) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM node WHERE path = ?", [path])
        .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(deleted > 0)
}

/// List all indexed files of one media kind, ordered by path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_nodes_by_file_type(conn: &Connection, file_type: FileType) -> Result<Vec<IndexNode>> {
    let sql = format!("SELECT {NODE_COLUMNS} FROM node WHERE file_type = ? ORDER BY path");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let nodes = stmt
        .query_map([file_type.as_str()], row_to_node)
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(nodes)
}

/// Count all nodes.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_nodes(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM node", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
