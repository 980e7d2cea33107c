//! Capture metadata extraction.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::storage::GeoPoint;
use crate::Result;

/// Capture time and GPS position of a media file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureMetadata {
    pub date_taken: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
}

impl CaptureMetadata {
    /// Build from optional parts. A point needs both coordinates.
    #[must_use]
    pub fn new(
        date_taken: Option<DateTime<Utc>>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        Self {
            date_taken,
            location: latitude
                .zip(longitude)
                .map(|(lat, lon)| GeoPoint::new(lat, lon)),
        }
    }
}

/// Reads capture metadata from a media file.
pub trait MetadataExtractor: Send + Sync {
    /// Extract capture time and GPS position of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its metadata is corrupt.
    fn get_metadata(&self, path: &Path) -> Result<CaptureMetadata>;
}

/// Extractor that reports nothing for every file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataExtractor for NoMetadata {
    fn get_metadata(&self, _path: &Path) -> Result<CaptureMetadata> {
        Ok(CaptureMetadata::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_requires_both_coordinates() {
        assert_eq!(CaptureMetadata::new(None, Some(1.0), None).location, None);
        assert_eq!(CaptureMetadata::new(None, None, Some(2.0)).location, None);
        assert_eq!(
            CaptureMetadata::new(None, Some(1.0), Some(2.0)).location,
            Some(GeoPoint::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_no_metadata() {
        let meta = NoMetadata.get_metadata(Path::new("/data/a.jpg")).unwrap();
        assert_eq!(meta, CaptureMetadata::default());
    }
}
