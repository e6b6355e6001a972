//! Reusable Dijkstra state with version stamping (O(1) reset between searches)

use priority_queue::PriorityQueue;
use std::cmp::Reverse;

use crate::storage::{EdgeId, NodeId};

pub const INFINITY: u64 = u64::MAX;

/// Version-stamped label: distance and the edge it was reached by
#[derive(Clone, Copy)]
struct Label {
    dist: u64,
    parent: Option<(NodeId, EdgeId)>,
    version: u32,
}

pub struct SearchState {
    labels: Vec<Label>,
    version: u32,
    pub(crate) heap: PriorityQueue<NodeId, Reverse<u64>>,
    pub(crate) settled: usize,
}

impl SearchState {
    pub fn new(n_nodes: usize) -> Self {
        Self {
            labels: vec![
                Label {
                    dist: INFINITY,
                    parent: None,
                    version: 0,
                };
                n_nodes
            ],
            version: 0,
            heap: PriorityQueue::new(),
            settled: 0,
        }
    }

    pub fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            // Version wrapped, need full reset
            for label in &mut self.labels {
                label.version = 0;
            }
            self.version = 1;
        }
        self.heap.clear();
        self.settled = 0;
    }

    /// Grow to cover nodes added since creation
    pub fn ensure_nodes(&mut self, n_nodes: usize) {
        if n_nodes > self.labels.len() {
            self.labels.resize(
                n_nodes,
                Label {
                    dist: INFINITY,
                    parent: None,
                    version: 0,
                },
            );
        }
    }

    #[inline]
    pub fn dist(&self, node: NodeId) -> u64 {
        let label = &self.labels[node as usize];
        if label.version == self.version {
            label.dist
        } else {
            INFINITY
        }
    }

    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<(NodeId, EdgeId)> {
        let label = &self.labels[node as usize];
        if label.version == self.version {
            label.parent
        } else {
            None
        }
    }

    /// Seed a search origin
    pub fn start(&mut self, node: NodeId) {
        self.labels[node as usize] = Label {
            dist: 0,
            parent: None,
            version: self.version,
        };
        self.heap.push(node, Reverse(0));
    }

    /// Improve the label of `node` if `dist` is smaller. Returns whether it changed.
    #[inline]
    pub fn relax(&mut self, node: NodeId, dist: u64, parent: (NodeId, EdgeId)) -> bool {
        if dist >= self.dist(node) {
            return false;
        }
        self.labels[node as usize] = Label {
            dist,
            parent: Some(parent),
            version: self.version,
        };
        self.heap.push_increase(node, Reverse(dist));
        true
    }

    /// Smallest tentative distance still queued
    #[inline]
    pub fn min_key(&self) -> u64 {
        self.heap.peek().map_or(INFINITY, |(_, Reverse(d))| *d)
    }

    #[inline]
    pub fn pop(&mut self) -> Option<(NodeId, u64)> {
        let (node, Reverse(dist)) = self.heap.pop()?;
        self.settled += 1;
        Some((node, dist))
    }

    pub fn settled(&self) -> usize {
        self.settled
    }

    /// Walk parent pointers from `node` back to the origin, returning edges origin-first
    pub fn path_to(&self, node: NodeId) -> Vec<(NodeId, EdgeId, NodeId)> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some((prev, edge)) = self.parent(current) {
            path.push((prev, edge, current));
            current = prev;
        }
        path.reverse();
        path
    }
}
