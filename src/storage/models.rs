//! Data models for the gallery index.
//!
//! - `IndexNode`: one indexed file or directory
//! - `NodeUpsert`: the values written by a merge-by-path
//! - `Tag` / `TagSource`: search tokens with provenance
//! - `Location`: a named place used for nearest-location tagging

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Media kind of an indexed file. Directories carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Image,
    Video,
}

impl FileType {
    /// Column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
        }
    }

    /// Classify a content type. Anything that is not `video/*` is an image.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video") {
            Self::Video
        } else {
            Self::Image
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IMAGE" => Ok(Self::Image),
            "VIDEO" => Ok(Self::Video),
            other => Err(StorageError::Database(format!("unknown file type '{other}'"))),
        }
    }
}

/// Where a tag came from. The tag set of each (node, source) is replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagSource {
    Filename,
    Location,
}

impl TagSource {
    /// Column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filename => "FILENAME",
            Self::Location => "LOCATION",
        }
    }
}

impl std::str::FromStr for TagSource {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FILENAME" => Ok(Self::Filename),
            "LOCATION" => Ok(Self::Location),
            other => Err(StorageError::Database(format!("unknown tag source '{other}'"))),
        }
    }
}

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Squared distance in degrees. Only used to rank candidates.
    #[must_use]
    pub fn distance_sq(&self, other: &Self) -> f64 {
        let dlat = self.latitude - other.latitude;
        let dlon = self.longitude - other.longitude;
        dlat.mul_add(dlat, dlon * dlon)
    }
}

/// A stored index node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    pub id: i64,
    /// `None` only for a configured root directory.
    pub parent_id: Option<i64>,
    /// Canonical absolute path.
    pub path: String,
    pub is_directory: bool,
    pub file_type: Option<FileType>,
    pub content_type: Option<String>,
    pub location: Option<GeoPoint>,
    pub nearest_location_id: Option<i64>,
    pub date_taken: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

/// Values written by `merge_node`. Every column is overwritten on update.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpsert {
    pub path: String,
    pub parent_id: Option<i64>,
    pub is_directory: bool,
    pub file_type: Option<FileType>,
    pub content_type: Option<String>,
    pub location: Option<GeoPoint>,
    pub nearest_location_id: Option<i64>,
    pub date_taken: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

impl NodeUpsert {
    /// A directory node.
    #[must_use]
    pub fn directory(
        path: impl Into<String>,
        parent_id: Option<i64>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            parent_id,
            is_directory: true,
            file_type: None,
            content_type: None,
            location: None,
            nearest_location_id: None,
            date_taken: None,
            last_modified,
        }
    }

    /// A file node; fill in media fields with the `with_*` setters.
    #[must_use]
    pub fn file(
        path: impl Into<String>,
        parent_id: i64,
        file_type: FileType,
        content_type: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            parent_id: Some(parent_id),
            is_directory: false,
            file_type: Some(file_type),
            content_type: Some(content_type.into()),
            location: None,
            nearest_location_id: None,
            date_taken: None,
            last_modified,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn with_nearest_location(mut self, id: Option<i64>) -> Self {
        self.nearest_location_id = id;
        self
    }

    #[must_use]
    pub fn with_date_taken(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.date_taken = date;
        self
    }
}

/// A stored tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub node_id: i64,
    pub source: TagSource,
    pub text: String,
}

/// A named place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Database id; `None` before insertion.
    pub id: Option<i64>,
    pub name: String,
    pub country_name: Option<String>,
    /// ISO country code.
    pub country_code: Option<String>,
    pub admin_area: Option<String>,
    /// Geonames-style feature code (e.g. `PPL`).
    pub feature_code: Option<String>,
    pub point: GeoPoint,
}

impl Location {
    /// Create a location with only a name and point.
    #[must_use]
    pub fn new(name: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            id: None,
            name: name.into(),
            country_name: None,
            country_code: None,
            admin_area: None,
            feature_code: None,
            point,
        }
    }

    #[must_use]
    pub fn with_country(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.country_name = Some(name.into());
        self.country_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_admin_area(mut self, admin_area: impl Into<String>) -> Self {
        self.admin_area = Some(admin_area.into());
        self
    }

    #[must_use]
    pub fn with_feature_code(mut self, code: impl Into<String>) -> Self {
        self.feature_code = Some(code.into());
        self
    }

    /// LOCATION tag texts: distinct non-blank name, country, country code and admin area.
    #[must_use]
    pub fn tag_texts(&self) -> Vec<String> {
        let candidates = [
            Some(self.name.as_str()),
            self.country_name.as_deref(),
            self.country_code.as_deref(),
            self.admin_area.as_deref(),
        ];

        let mut texts: Vec<String> = Vec::new();
        for text in candidates.into_iter().flatten().map(str::trim) {
            if !text.is_empty() && !texts.iter().any(|t| t.eq_ignore_ascii_case(text)) {
                texts.push(text.to_string());
            }
        }
        texts
    }
}

/// Convert a timestamp to the stored integer form.
#[must_use]
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Convert a stored integer back to a timestamp.
#[must_use]
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
