//! Nearest-location lookup.

use crate::storage::{find_locations_in_window, Database, GeoPoint, Location};
use crate::Result;

/// Half-widths in degrees of the search windows, tried in order.
const SEARCH_WINDOWS: [f64; 3] = [0.1, 1.0, 10.0];

/// Finds the named place closest to a point.
pub trait LocationIndex: Send + Sync {
    /// The nearest known location, if any is close enough.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    fn nearest(&self, point: GeoPoint) -> Result<Option<Location>>;
}

/// `LocationIndex` over the `location` table.
///
/// Widens the search square until it contains a candidate, then ranks the
/// candidates by squared degree distance.
#[derive(Debug, Clone)]
pub struct SqliteLocationIndex {
    db: Database,
}

impl SqliteLocationIndex {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

impl LocationIndex for SqliteLocationIndex {
    fn nearest(&self, point: GeoPoint) -> Result<Option<Location>> {
        for delta in SEARCH_WINDOWS {
            let candidates = self
                .db
                .with_conn(|conn| find_locations_in_window(conn, point, delta))?;

            let closest = candidates.into_iter().min_by(|a, b| {
                a.point
                    .distance_sq(&point)
                    .total_cmp(&b.point.distance_sq(&point))
            });

            if closest.is_some() {
                return Ok(closest);
            }
        }

        Ok(None)
    }
}
