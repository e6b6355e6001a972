//! Error types for the butterfly-osm routing core
//!
//! The variants follow the failure classes of the graph pipeline:
//! - bounds errors (ids beyond the current allocation) are programming errors,
//! - consistency errors abort preprocessing or a query,
//! - format and I/O errors come from loading or persisting graphs.
//!
//! Search budget exhaustion is not an error; callers degrade locally.

use thiserror::Error;

/// Main error type for butterfly-osm graph operations
#[derive(Debug, Error)]
pub enum Error {
    /// Node id beyond the current node count
    #[error("node {node} out of bounds (node count {count})")]
    NodeOutOfBounds { node: u32, count: u32 },

    /// Edge id beyond the current edge count
    #[error("edge {edge} out of bounds (edge count {count})")]
    EdgeOutOfBounds { edge: u32, count: u32 },

    /// Edges must connect two distinct nodes
    #[error("self-loop at node {0} cannot be stored")]
    SelfLoop(u32),

    /// The edge table cannot address more edges
    #[error("edge table is full ({0} edges)")]
    CapacityExceeded(u64),

    /// The contraction queue disagrees with the graph state
    #[error("priority queue inconsistency: {0}")]
    QueueInconsistency(String),

    /// A shortcut points at an edge that does not exist or does not connect
    #[error("shortcut {shortcut} references invalid skipped edge {skipped}")]
    MissingSkippedEdge { shortcut: u32, skipped: u32 },

    /// An edge or shortcut weight beyond the storable range
    #[error("weight {weight} between nodes {from} and {to} exceeds the storable range")]
    WeightOverflow { from: u32, to: u32, weight: u64 },

    /// Persisted graph is corrupt or of an unknown layout
    #[error("invalid graph file: {0}")]
    InvalidFormat(String),

    /// Invalid configuration, parameters or graph state for the requested operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for butterfly-osm operations
pub type Result<T> = std::result::Result<T, Error>;
