//! butterfly-ch: Contraction Hierarchies routing core
//!
//! - [`storage`]: forward-star graph over growable word arrays (RAM or memory-mapped)
//! - [`ch`]: node contraction, witness search, level-filtered bidirectional queries
//! - [`formats`]: `.bch` graph files with CRC-64 footer
//! - [`ingest`]: JSON edge lists into storage
//! - [`validate`]: CH vs Dijkstra on random pairs

pub mod ch;
pub mod cli;
pub mod formats;
pub mod ingest;
pub mod storage;
pub mod validate;
pub mod weighting;

pub use butterfly_common::{Error, Result};
pub use ch::{ChQuery, ContractionConfig, Preparation, QueryConfig, Route};
pub use storage::{Direction, EdgeFlags, GraphStorage};
pub use weighting::Weighting;
