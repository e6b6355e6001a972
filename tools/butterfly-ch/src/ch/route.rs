//! Route result shared by the CH query and plain Dijkstra

use serde::Serialize;

use crate::storage::{EdgeId, NodeId};

/// One base edge of a route, oriented along the route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathEdge {
    pub edge: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: u64,
    /// Base edges from `source` to `target`, shortcuts unpacked
    pub edges: Vec<PathEdge>,
    /// `source`, then the head of every edge
    pub nodes: Vec<NodeId>,
    /// Nodes settled by the search (both directions for CH)
    pub settled: usize,
}

impl Route {
    /// Route from a node to itself
    pub fn trivial(node: NodeId) -> Self {
        Self {
            source: node,
            target: node,
            weight: 0,
            edges: Vec::new(),
            nodes: vec![node],
            settled: 0,
        }
    }

    pub(crate) fn from_edges(source: NodeId, target: NodeId, weight: u64, edges: Vec<PathEdge>, settled: usize) -> Self {
        let mut nodes = Vec::with_capacity(edges.len() + 1);
        nodes.push(source);
        nodes.extend(edges.iter().map(|e| e.to));
        Self {
            source,
            target,
            weight,
            edges,
            nodes,
            settled,
        }
    }

    /// Sum of the base edge weights
    pub fn edge_weight_sum(&self) -> u64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Whether consecutive edges connect and the chain runs from `source` to `target`
    pub fn is_chained(&self) -> bool {
        let mut at = self.source;
        for e in &self.edges {
            if e.from != at {
                return false;
            }
            at = e.to;
        }
        at == self.target
    }
}
