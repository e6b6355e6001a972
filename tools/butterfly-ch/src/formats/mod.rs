//! On-disk formats

pub mod crc;
pub mod graph_file;

pub use graph_file::{GraphFile, GraphHeader};
