//! Graph storage: word-array data access and the forward-star graph

pub mod data_access;
pub mod flags;
pub mod graph;

pub use data_access::{DataAccess, Directory, MmapDataAccess, MmapDirectory, RamDataAccess, RamDirectory};
pub use flags::EdgeFlags;
pub use graph::{BBox, Direction, EdgeId, EdgeIter, EdgeView, GraphStorage, NodeId, MAX_WEIGHT, NO_EDGE};
