//! Gallery Sync Library
//!
//! Keeps a `SQLite` photo and video index in step with a set of watched root
//! directories, tagging each file by filename and nearest known place.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod services;
pub mod storage;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
