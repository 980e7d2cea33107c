//! Collaborators the index synchronizer calls out to.
//!
//! - `MetadataExtractor`: capture time and GPS position of a file
//! - `LocationIndex`: nearest named place for a GPS position
//! - `AuthorizationOracle`: which root directories a principal may see

mod authorization;
mod location;
mod metadata;

pub use authorization::{AuthorizationOracle, Principal, RootRegistry};
pub use location::{LocationIndex, SqliteLocationIndex};
pub use metadata::{CaptureMetadata, MetadataExtractor, NoMetadata};
