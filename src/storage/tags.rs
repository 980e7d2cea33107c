//! Tag and filename-part storage.
//!
//! Both are always replaced as a whole: callers run these inside the same
//! transaction as the node merge so readers never see a mix of old and new.

use rusqlite::types::Type;
use rusqlite::{params, Connection};

use super::models::{Tag, TagSource};
use crate::error::StorageError;
use crate::Result;

/// Replace every tag of `source` on `node_id` with `texts`.
///
/// Blank texts are skipped.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn replace_tags(
    conn: &Connection,
    node_id: i64,
    source: TagSource,
    texts: &[String],
) -> Result<()> {
    conn.execute(
        "DELETE FROM tag WHERE node_id = ? AND source = ?",
        params![node_id, source.as_str()],
    )
    .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut stmt = conn
        .prepare_cached("INSERT INTO tag (node_id, text, source) VALUES (?, ?, ?)")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    for text in texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        stmt.execute(params![node_id, text, source.as_str()])
            .map_err(|e| StorageError::Database(e.to_string()))?;
    }

    Ok(())
}

/// List tags of a node, optionally restricted to one source.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_tags(conn: &Connection, node_id: i64, source: Option<TagSource>) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare(
            "SELECT node_id, source, text FROM tag
             WHERE node_id = ?1 AND (?2 IS NULL OR source = ?2)
             ORDER BY id",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let tags = stmt
        .query_map(params![node_id, source.map(TagSource::as_str)], |row| {
            let source = row
                .get::<_, String>(1)?
                .parse::<TagSource>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
            Ok(Tag {
                node_id: row.get(0)?,
                source,
                text: row.get(2)?,
            })
        })
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(tags)
}

/// Ids of nodes carrying a tag equal to `text`, compared case-insensitively.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_node_ids_by_tag(conn: &Connection, text: &str) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT node_id FROM tag WHERE text = ? ORDER BY node_id")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let ids = stmt
        .query_map([text], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(ids)
}

/// Replace the ordered filename tokens of a node.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn replace_filename_parts(conn: &Connection, node_id: i64, parts: &[String]) -> Result<()> {
    conn.execute("DELETE FROM filename_part WHERE node_id = ?", [node_id])
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut stmt = conn
        .prepare_cached("INSERT INTO filename_part (node_id, part_index, part) VALUES (?, ?, ?)")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    for (index, part) in parts.iter().enumerate() {
        let index = i64::try_from(index).map_err(|e| StorageError::Database(e.to_string()))?;
        stmt.execute(params![node_id, index, part])
            .map_err(|e| StorageError::Database(e.to_string()))?;
    }

    Ok(())
}

/// Ordered filename tokens of a node.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_filename_parts(conn: &Connection, node_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT part FROM filename_part WHERE node_id = ? ORDER BY part_index")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let parts = stmt
        .query_map([node_id], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{merge_node, migrate, models::from_millis, Database, NodeUpsert};

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .with_conn(|conn| {
                migrate(conn)?;
                merge_node(conn, &NodeUpsert::directory("/data", None, from_millis(0)))
            })
            .unwrap();
        (db, id)
    }

    fn texts(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_replace_tags_replaces_whole_set() {
        let (db, id) = setup();
        db.with_conn(|conn| {
            replace_tags(conn, id, TagSource::Filename, &["a".into(), "b".into()])?;
            replace_tags(conn, id, TagSource::Filename, &["c".into(), "d".into()])?;

            let tags = list_tags(conn, id, Some(TagSource::Filename))?;
            assert_eq!(texts(&tags), vec!["c", "d"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_replace_tags_leaves_other_source() {
        let (db, id) = setup();
        db.with_conn(|conn| {
            replace_tags(conn, id, TagSource::Location, &["Paris".into()])?;
            replace_tags(conn, id, TagSource::Filename, &["x".into(), "  ".into()])?;
            replace_tags(conn, id, TagSource::Filename, &[])?;

            let all = list_tags(conn, id, None)?;
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].source, TagSource::Location);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_find_by_tag_case_insensitive() {
        let (db, id) = setup();
        db.with_conn(|conn| {
            replace_tags(conn, id, TagSource::Location, &["Paris".into()])?;
            assert_eq!(find_node_ids_by_tag(conn, "paris")?, vec![id]);
            assert!(find_node_ids_by_tag(conn, "lyon")?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_filename_parts_keep_order() {
        let (db, id) = setup();
        db.with_conn(|conn| {
            replace_filename_parts(conn, id, &["old".into()])?;
            let parts: Vec<String> = ["img", "2024", "img"].iter().map(ToString::to_string).collect();
            replace_filename_parts(conn, id, &parts)?;
            assert_eq!(get_filename_parts(conn, id)?, parts);
            Ok(())
        })
        .unwrap();
    }
}
