//! Location storage backing the nearest-location lookup.

use rusqlite::{params, Connection, Row};

use super::models::{GeoPoint, Location};
use crate::error::StorageError;
use crate::Result;

fn row_to_location(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        country_name: row.get(2)?,
        country_code: row.get(3)?,
        admin_area: row.get(4)?,
        feature_code: row.get(5)?,
        point: GeoPoint::new(row.get(6)?, row.get(7)?),
    })
}

/// Insert a location and return its id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn insert_location(conn: &Connection, location: &Location) -> Result<i64> {
    conn.execute(
        "INSERT INTO location (name, country_name, country_code, admin_area, feature_code, \
         latitude, longitude) VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            location.name,
            location.country_name,
            location.country_code,
            location.admin_area,
            location.feature_code,
            location.point.latitude,
            location.point.longitude,
        ],
    )
    .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(conn.last_insert_rowid())
}

/// Get a location by id.
///
/// # Errors
///
/// Returns `StorageError::NotFound` if no such location exists.
pub fn get_location(conn: &Connection, id: i64) -> Result<Location> {
    conn.query_row(
        "SELECT id, name, country_name, country_code, admin_area, feature_code, latitude, longitude
         FROM location WHERE id = ?",
        [id],
        row_to_location,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("location", id.to_string()),
        other => StorageError::Database(other.to_string()),
    })
    .map_err(Into::into)
}

/// Locations inside the square of half-width `delta` degrees around `center`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_locations_in_window(
    conn: &Connection,
    center: GeoPoint,
    delta: f64,
) -> Result<Vec<Location>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, name, country_name, country_code, admin_area, feature_code, latitude, longitude
             FROM location
             WHERE latitude BETWEEN ?1 AND ?2 AND longitude BETWEEN ?3 AND ?4",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let locations = stmt
        .query_map(
            params![
                center.latitude - delta,
                center.latitude + delta,
                center.longitude - delta,
                center.longitude + delta,
            ],
            row_to_location,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(locations)
}
