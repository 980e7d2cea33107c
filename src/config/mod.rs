//! Configuration management for gallery-sync.
//!
//! Two sources of configuration:
//! - Application settings from command-line arguments and `GALLERY_*` environment variables
//! - The roots file, which names the directories that are watched and indexed

mod roots;
mod settings;

pub use roots::{load_root_directories, parse_root_config, RootDirectory};
pub use settings::{Config, DEFAULT_EXTENSIONS};
