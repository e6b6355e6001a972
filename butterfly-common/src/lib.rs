//! Common utilities for the butterfly-osm routing core

pub mod error;

pub use error::{Error, Result};
