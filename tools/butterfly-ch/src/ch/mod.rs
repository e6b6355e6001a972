//! Contraction Hierarchies: preparation, witness search, queries and unpacking

pub mod config;
pub mod dijkstra;
pub mod filter;
pub mod preparation;
pub mod query;
pub mod route;
pub mod search_state;
pub mod shortcuts;
pub mod unpack;
pub mod witness;

pub use config::{ContractionConfig, QueryConfig};
pub use dijkstra::Dijkstra;
pub use filter::EdgeFilter;
pub use preparation::{
    apply_weighting, insert_or_update_shortcut, prepare, ContractionProgress, ContractionStats, Preparation,
    ShortcutInsert,
};
pub use query::ChQuery;
pub use route::{PathEdge, Route};
pub use shortcuts::{Shortcut, ShortcutFinder};
pub use witness::WitnessSearch;
