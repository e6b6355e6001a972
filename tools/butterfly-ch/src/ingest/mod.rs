//! JSON edge-list ingestion
//!
//! Accepts graphs whose nodes are already resolved to dense ids:
//!
//! ```json
//! {
//!   "nodes": [{ "lat": 52.52, "lon": 13.40, "ele": 34.0 }],
//!   "edges": [{ "from": 0, "to": 1, "distance": 120.5, "forward": true, "backward": true, "speed": 50 }]
//! }
//! ```
//!
//! Distances are meters and stored as millimeters; a distance too large for the edge weight
//! field is an error. Self-loops and edges open in neither
//! direction are skipped with a warning.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::warn;

use crate::storage::{DataAccess, EdgeFlags, GraphStorage, RamDataAccess};

#[derive(Debug, Clone, Deserialize)]
pub struct JsonNode {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub ele: Option<f64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonEdge {
    pub from: u32,
    pub to: u32,
    /// Meters
    pub distance: f64,
    #[serde(default = "default_true")]
    pub forward: bool,
    #[serde(default = "default_true")]
    pub backward: bool,
    /// km/h, used by the `fastest` weighting
    #[serde(default)]
    pub speed: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonGraph {
    #[serde(default)]
    pub nodes: Vec<JsonNode>,
    pub edges: Vec<JsonEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub nodes: u32,
    pub edges: u32,
    pub skipped_self_loops: u32,
    pub skipped_closed: u32,
}

/// Populate `graph` with the nodes and edges of `input`
pub fn load_into<D: DataAccess>(graph: &mut GraphStorage<D>, input: &JsonGraph) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for (id, node) in input.nodes.iter().enumerate() {
        let id = u32::try_from(id).context("Too many nodes")?;
        graph
            .set_coordinates(id, node.lat, node.lon, node.ele)
            .with_context(|| format!("Invalid node {id}"))?;
    }

    for (i, edge) in input.edges.iter().enumerate() {
        if !edge.distance.is_finite() || edge.distance < 0.0 {
            bail!("Edge #{i} ({} → {}) has invalid distance {}", edge.from, edge.to, edge.distance);
        }
        if edge.from == edge.to {
            warn!(edge = i, node = edge.from, "skipping self-loop");
            stats.skipped_self_loops += 1;
            continue;
        }
        let flags = match (edge.forward, edge.backward) {
            (true, true) => EdgeFlags::both(),
            (true, false) => EdgeFlags::forward(),
            (false, true) => EdgeFlags::backward(),
            (false, false) => {
                warn!(edge = i, from = edge.from, to = edge.to, "skipping edge closed in both directions");
                stats.skipped_closed += 1;
                continue;
            }
        };
        let flags = flags.with_speed(edge.speed.unwrap_or(0));
        let distance_mm = (edge.distance * 1000.0).round() as u64;
        graph
            .add_edge(edge.from, edge.to, distance_mm, flags)
            .with_context(|| format!("Failed to add edge #{i}"))?;
        stats.edges += 1;
    }

    stats.nodes = graph.node_count();
    Ok(stats)
}

pub fn parse_str(json: &str) -> Result<JsonGraph> {
    serde_json::from_str(json).context("Invalid graph JSON")
}

/// Read a JSON graph file into a fresh in-memory graph
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<(GraphStorage<RamDataAccess>, IngestStats)> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let input: JsonGraph = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid graph JSON in {}", path.display()))?;
    let mut graph = GraphStorage::new();
    let stats = load_into(&mut graph, &input)?;
    Ok((graph, stats))
}
