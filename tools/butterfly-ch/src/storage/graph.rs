//! Forward-star graph storage with intrusive per-node edge lists
//!
//! Two word tables:
//! - nodes: `[edge_ref, lat, lon, ele, level]` per node, where `edge_ref` is the head of the
//!   node's edge list
//! - edges: `[node_a, node_b, link_a, link_b, weight_lo, weight_hi, flags, skip_1, skip_2, orig]`
//!   per edge, the weight being a u64 split over two words
//!
//! Every edge is stored once with `node_a < node_b` and is threaded through the lists of both
//! endpoints: `link_a` continues the list of `node_a`, `link_b` the list of `node_b`. Direction
//! flags are relative to `node_a` and swapped when viewed from `node_b`.
//!
//! Out-of-range ids are programming errors and panic here. Entry points that take ids from
//! callers check them with [`GraphStorage::check_node`] first.

use butterfly_common::{Error, Result};
use serde::Serialize;
use std::fmt;

use super::data_access::{DataAccess, Directory, RamDataAccess};
use super::flags::EdgeFlags;
use crate::weighting::Weighting;

pub type NodeId = u32;
pub type EdgeId = u32;

/// End of an edge list / no skipped edge
pub const NO_EDGE: EdgeId = u32::MAX;
/// Elevation slot value for nodes without elevation
pub const NO_ELEVATION: i32 = i32::MIN;

/// Fixed-point scale of coordinates (1e-7 degrees)
pub const COORD_SCALE: f64 = 1e7;
/// Fixed-point scale of elevation (decimeters)
pub const ELEVATION_SCALE: f64 = 10.0;

pub(crate) const NODE_WORDS: usize = 5;
pub(crate) const EDGE_WORDS: usize = 10;

const N_EDGE_REF: u64 = 0;
const N_LAT: u64 = 1;
const N_LON: u64 = 2;
const N_ELE: u64 = 3;
const N_LEVEL: u64 = 4;

const E_NODEA: u64 = 0;
const E_NODEB: u64 = 1;
const E_LINKA: u64 = 2;
const E_LINKB: u64 = 3;
const E_WEIGHT_LO: u64 = 4;
const E_WEIGHT_HI: u64 = 5;
const E_FLAGS: u64 = 6;
const E_SKIP1: u64 = 7;
const E_SKIP2: u64 = 8;
const E_ORIG: u64 = 9;

/// Largest storable edge weight; sums along paths saturate instead of wrapping
pub const MAX_WEIGHT: u64 = u64::MAX - 1;

const GROWTH_FACTOR: f64 = 1.5;
const MIN_BYTES: u64 = 1024;

/// Which edges of a node to visit, relative to that node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Bounding box of all coordinates set, in fixed-point 1e-7 degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BBox {
    pub min_lat: i32,
    pub min_lon: i32,
    pub max_lat: i32,
    pub max_lon: i32,
}

impl BBox {
    pub const fn empty() -> Self {
        Self {
            min_lat: i32::MAX,
            min_lon: i32::MAX,
            max_lat: i32::MIN,
            max_lon: i32::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat
    }

    pub fn extend(&mut self, lat: i32, lon: i32) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    /// `(min_lat, min_lon, max_lat, max_lon)` in degrees
    pub fn degrees(&self) -> Option<(f64, f64, f64, f64)> {
        if self.is_empty() {
            return None;
        }
        Some((
            self.min_lat as f64 / COORD_SCALE,
            self.min_lon as f64 / COORD_SCALE,
            self.max_lat as f64 / COORD_SCALE,
            self.max_lon as f64 / COORD_SCALE,
        ))
    }
}

impl Default for BBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// One edge seen from one of its endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeView {
    pub edge: EdgeId,
    pub base: NodeId,
    pub adj: NodeId,
    pub weight: u64,
    /// Flags relative to `base`
    pub flags: EdgeFlags,
    pub skipped: Option<(EdgeId, EdgeId)>,
    pub original_edges: u32,
}

impl EdgeView {
    #[inline]
    pub fn is_shortcut(&self) -> bool {
        self.skipped.is_some()
    }
}

pub struct GraphStorage<D: DataAccess = RamDataAccess> {
    nodes: D,
    edges: D,
    node_count: u32,
    edge_count: u32,
    shortcut_count: u32,
    bounds: BBox,
    weighting: Option<Weighting>,
    contracted: bool,
}

impl<D: DataAccess> fmt::Debug for GraphStorage<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphStorage")
            .field("nodes", &self.node_count)
            .field("edges", &self.edge_count)
            .field("shortcuts", &self.shortcut_count)
            .field("bounds", &self.bounds)
            .field("weighting", &self.weighting)
            .field("contracted", &self.contracted)
            .finish()
    }
}

impl GraphStorage<RamDataAccess> {
    /// Empty in-memory graph
    pub fn new() -> Self {
        Self::empty(RamDataAccess::new("nodes"), RamDataAccess::new("edges"))
    }
}

impl Default for GraphStorage<RamDataAccess> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DataAccess> GraphStorage<D> {
    /// Empty graph whose tables live in `dir`
    pub fn create<Dir: Directory<Access = D>>(dir: &Dir) -> Result<Self> {
        let nodes = dir.find_create("nodes")?;
        let edges = dir.find_create("edges")?;
        Ok(Self::empty(nodes, edges))
    }

    fn empty(nodes: D, edges: D) -> Self {
        Self {
            nodes,
            edges,
            node_count: 0,
            edge_count: 0,
            shortcut_count: 0,
            bounds: BBox::empty(),
            weighting: None,
            contracted: false,
        }
    }

    /// Reassemble a graph from loaded tables. Callers validate with [`Self::check_structure`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_raw_parts(
        nodes: D,
        edges: D,
        node_count: u32,
        edge_count: u32,
        shortcut_count: u32,
        bounds: BBox,
        weighting: Option<Weighting>,
        contracted: bool,
    ) -> Self {
        Self {
            nodes,
            edges,
            node_count,
            edge_count,
            shortcut_count,
            bounds,
            weighting,
            contracted,
        }
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Base edges plus shortcuts
    pub fn edge_count(&self) -> u32 {
        self.edge_count
    }

    pub fn shortcut_count(&self) -> u32 {
        self.shortcut_count
    }

    pub fn base_edge_count(&self) -> u32 {
        self.edge_count - self.shortcut_count
    }

    pub fn bounds(&self) -> BBox {
        self.bounds
    }

    /// Weighting applied to base edges, `None` while weights are raw distances
    pub fn weighting(&self) -> Option<Weighting> {
        self.weighting
    }

    pub(crate) fn set_weighting(&mut self, weighting: Weighting) {
        self.weighting = Some(weighting);
    }

    /// Whether a contraction hierarchy has been built on this graph
    pub fn is_contracted(&self) -> bool {
        self.contracted
    }

    pub(crate) fn mark_contracted(&mut self) {
        self.contracted = true;
    }

    /// Return `NodeOutOfBounds` for ids beyond the node table
    pub fn check_node(&self, node: NodeId) -> Result<()> {
        if node >= self.node_count {
            return Err(Error::NodeOutOfBounds {
                node,
                count: self.node_count,
            });
        }
        Ok(())
    }

    pub fn check_edge(&self, edge: EdgeId) -> Result<()> {
        if edge >= self.edge_count {
            return Err(Error::EdgeOutOfBounds {
                edge,
                count: self.edge_count,
            });
        }
        Ok(())
    }

    #[inline]
    fn assert_node(&self, node: NodeId) {
        assert!(
            node < self.node_count,
            "node {} out of bounds (node count {})",
            node,
            self.node_count
        );
    }

    #[inline]
    fn assert_edge(&self, edge: EdgeId) {
        assert!(
            edge < self.edge_count,
            "edge {} out of bounds (edge count {})",
            edge,
            self.edge_count
        );
    }

    fn ensure_capacity(da: &mut D, words: u64) -> Result<()> {
        let bytes = words * 4;
        if bytes > da.capacity() {
            let grown = (da.capacity() as f64 * GROWTH_FACTOR) as u64;
            let target = bytes.max(grown).max(MIN_BYTES);
            tracing::trace!(table = da.name(), from = da.capacity(), to = target, "growing table");
            da.grow_to(target)?;
        }
        Ok(())
    }

    /// Make `node` addressable, initialising every new node slot up to it
    pub fn ensure_node(&mut self, node: NodeId) -> Result<()> {
        if node < self.node_count {
            return Ok(());
        }
        if node == u32::MAX {
            return Err(Error::CapacityExceeded(node as u64));
        }
        let new_count = node + 1;
        Self::ensure_capacity(&mut self.nodes, new_count as u64 * NODE_WORDS as u64)?;
        for n in self.node_count..new_count {
            let base = n as u64 * NODE_WORDS as u64;
            self.nodes.set(base + N_EDGE_REF, NO_EDGE);
            self.nodes.set(base + N_LAT, 0);
            self.nodes.set(base + N_LON, 0);
            self.nodes.set(base + N_ELE, NO_ELEVATION as u32);
            self.nodes.set(base + N_LEVEL, 0);
        }
        self.node_count = new_count;
        Ok(())
    }

    #[inline]
    fn node_word(&self, node: NodeId, slot: u64) -> u32 {
        self.nodes.get(node as u64 * NODE_WORDS as u64 + slot)
    }

    #[inline]
    fn set_node_word(&mut self, node: NodeId, slot: u64, value: u32) {
        self.nodes.set(node as u64 * NODE_WORDS as u64 + slot, value);
    }

    #[inline]
    fn edge_word(&self, edge: EdgeId, slot: u64) -> u32 {
        self.edges.get(edge as u64 * EDGE_WORDS as u64 + slot)
    }

    #[inline]
    fn set_edge_word(&mut self, edge: EdgeId, slot: u64, value: u32) {
        self.edges.set(edge as u64 * EDGE_WORDS as u64 + slot, value);
    }

    #[inline]
    fn edge_weight(&self, edge: EdgeId) -> u64 {
        let lo = self.edge_word(edge, E_WEIGHT_LO) as u64;
        let hi = self.edge_word(edge, E_WEIGHT_HI) as u64;
        (hi << 32) | lo
    }

    #[inline]
    fn set_edge_weight(&mut self, edge: EdgeId, weight: u64) {
        self.set_edge_word(edge, E_WEIGHT_LO, weight as u32);
        self.set_edge_word(edge, E_WEIGHT_HI, (weight >> 32) as u32);
    }

    /// Add a base edge between `a` and `b`. `flags` are relative to `a`.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, weight: u64, flags: EdgeFlags) -> Result<EdgeId> {
        self.insert_edge(a, b, weight, flags, (NO_EDGE, NO_EDGE), 1)
    }

    /// Add a shortcut replacing the two `skipped` edges, which must already exist
    pub fn add_shortcut(
        &mut self,
        a: NodeId,
        b: NodeId,
        weight: u64,
        flags: EdgeFlags,
        skipped: (EdgeId, EdgeId),
        original_edges: u32,
    ) -> Result<EdgeId> {
        for skip in [skipped.0, skipped.1] {
            if skip >= self.edge_count {
                return Err(Error::MissingSkippedEdge {
                    shortcut: self.edge_count,
                    skipped: skip,
                });
            }
        }
        let edge = self.insert_edge(a, b, weight, flags, skipped, original_edges)?;
        self.shortcut_count += 1;
        Ok(edge)
    }

    fn insert_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        weight: u64,
        flags: EdgeFlags,
        skipped: (EdgeId, EdgeId),
        original_edges: u32,
    ) -> Result<EdgeId> {
        if a == b {
            return Err(Error::SelfLoop(a));
        }
        if weight > MAX_WEIGHT {
            return Err(Error::WeightOverflow { from: a, to: b, weight });
        }
        if self.edge_count == NO_EDGE {
            return Err(Error::CapacityExceeded(self.edge_count as u64));
        }
        self.ensure_node(a.max(b))?;

        let (node_a, node_b, flags) = if a > b { (b, a, flags.swapped()) } else { (a, b, flags) };

        let edge = self.edge_count;
        Self::ensure_capacity(&mut self.edges, (edge as u64 + 1) * EDGE_WORDS as u64)?;
        self.edge_count += 1;

        let link_a = self.node_word(node_a, N_EDGE_REF);
        let link_b = self.node_word(node_b, N_EDGE_REF);
        self.set_edge_word(edge, E_NODEA, node_a);
        self.set_edge_word(edge, E_NODEB, node_b);
        self.set_edge_word(edge, E_LINKA, link_a);
        self.set_edge_word(edge, E_LINKB, link_b);
        self.set_edge_weight(edge, weight);
        self.set_edge_word(edge, E_FLAGS, flags.bits());
        self.set_edge_word(edge, E_SKIP1, skipped.0);
        self.set_edge_word(edge, E_SKIP2, skipped.1);
        self.set_edge_word(edge, E_ORIG, original_edges);
        self.set_node_word(node_a, N_EDGE_REF, edge);
        self.set_node_word(node_b, N_EDGE_REF, edge);
        Ok(edge)
    }

    /// Lazily iterate the edges of `node` in `direction`.
    ///
    /// The iterator is `Clone`; calling again restarts from the head of the list.
    pub fn edges_of(&self, node: NodeId, direction: Direction) -> EdgeIter<'_, D> {
        self.assert_node(node);
        EdgeIter {
            graph: self,
            base: node,
            next: self.node_word(node, N_EDGE_REF),
            direction,
        }
    }

    /// Stored endpoints `(node_a, node_b)` with `node_a < node_b`
    pub fn endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        self.assert_edge(edge);
        (self.edge_word(edge, E_NODEA), self.edge_word(edge, E_NODEB))
    }

    fn view(&self, edge: EdgeId, base: NodeId) -> EdgeView {
        let node_a = self.edge_word(edge, E_NODEA);
        let node_b = self.edge_word(edge, E_NODEB);
        let stored = EdgeFlags::from_bits(self.edge_word(edge, E_FLAGS));
        let (adj, flags) = if base == node_a {
            (node_b, stored)
        } else {
            (node_a, stored.swapped())
        };
        let skip1 = self.edge_word(edge, E_SKIP1);
        let skipped = (skip1 != NO_EDGE).then(|| (skip1, self.edge_word(edge, E_SKIP2)));
        EdgeView {
            edge,
            base,
            adj,
            weight: self.edge_weight(edge),
            flags,
            skipped,
            original_edges: self.edge_word(edge, E_ORIG),
        }
    }

    /// View `edge` so that it ends in `adj`; `None` if `adj` is not an endpoint
    pub fn edge(&self, edge: EdgeId, adj: NodeId) -> Option<EdgeView> {
        let (node_a, node_b) = self.endpoints(edge);
        if adj == node_b {
            Some(self.view(edge, node_a))
        } else if adj == node_a {
            Some(self.view(edge, node_b))
        } else {
            None
        }
    }

    /// Every stored edge once, viewed from its smaller endpoint
    pub fn all_edges(&self) -> impl Iterator<Item = EdgeView> + '_ {
        (0..self.edge_count).map(move |edge| self.view(edge, self.edge_word(edge, E_NODEA)))
    }

    pub fn set_weight(&mut self, edge: EdgeId, weight: u64) {
        self.assert_edge(edge);
        self.set_edge_weight(edge, weight.min(MAX_WEIGHT));
    }

    /// Rewrite weight, skipped edges and original edge count of an existing shortcut
    pub fn update_shortcut(
        &mut self,
        edge: EdgeId,
        weight: u64,
        skipped: (EdgeId, EdgeId),
        original_edges: u32,
    ) -> Result<()> {
        self.check_edge(edge)?;
        if weight > MAX_WEIGHT {
            let (from, to) = self.endpoints(edge);
            return Err(Error::WeightOverflow { from, to, weight });
        }
        for skip in [skipped.0, skipped.1] {
            if skip >= self.edge_count {
                return Err(Error::MissingSkippedEdge {
                    shortcut: edge,
                    skipped: skip,
                });
            }
        }
        self.set_edge_weight(edge, weight);
        self.set_edge_word(edge, E_SKIP1, skipped.0);
        self.set_edge_word(edge, E_SKIP2, skipped.1);
        self.set_edge_word(edge, E_ORIG, original_edges);
        Ok(())
    }

    pub fn set_level(&mut self, node: NodeId, level: u32) {
        self.assert_node(node);
        self.set_node_word(node, N_LEVEL, level);
    }

    /// Contraction rank, `0` while uncontracted
    #[inline]
    pub fn level(&self, node: NodeId) -> u32 {
        self.assert_node(node);
        self.node_word(node, N_LEVEL)
    }

    /// Set coordinates in degrees and elevation in meters, creating the node if needed
    pub fn set_coordinates(&mut self, node: NodeId, lat: f64, lon: f64, ele: Option<f64>) -> Result<()> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidInput(format!(
                "coordinates of node {node} out of range: {lat}, {lon}"
            )));
        }
        self.ensure_node(node)?;
        let lat = (lat * COORD_SCALE).round() as i32;
        let lon = (lon * COORD_SCALE).round() as i32;
        let ele = ele.map_or(NO_ELEVATION, |e| (e * ELEVATION_SCALE).round() as i32);
        self.set_node_word(node, N_LAT, lat as u32);
        self.set_node_word(node, N_LON, lon as u32);
        self.set_node_word(node, N_ELE, ele as u32);
        self.bounds.extend(lat, lon);
        Ok(())
    }

    pub fn latitude(&self, node: NodeId) -> f64 {
        self.assert_node(node);
        self.node_word(node, N_LAT) as i32 as f64 / COORD_SCALE
    }

    pub fn longitude(&self, node: NodeId) -> f64 {
        self.assert_node(node);
        self.node_word(node, N_LON) as i32 as f64 / COORD_SCALE
    }

    /// Elevation in meters, if known
    pub fn elevation(&self, node: NodeId) -> Option<f64> {
        self.assert_node(node);
        match self.node_word(node, N_ELE) as i32 {
            NO_ELEVATION => None,
            ele => Some(ele as f64 / ELEVATION_SCALE),
        }
    }

    /// Persist both tables through their data access objects
    pub fn flush(&mut self) -> Result<()> {
        self.nodes.persist()?;
        self.edges.persist()
    }

    pub(crate) fn raw_node(&self, node: NodeId) -> [u32; NODE_WORDS] {
        std::array::from_fn(|slot| self.node_word(node, slot as u64))
    }

    pub(crate) fn raw_edge(&self, edge: EdgeId) -> [u32; EDGE_WORDS] {
        std::array::from_fn(|slot| self.edge_word(edge, slot as u64))
    }

    /// Verify that every stored reference points inside the tables
    pub(crate) fn check_structure(&self) -> Result<()> {
        let valid_ref = |edge: u32| edge == NO_EDGE || edge < self.edge_count;
        for node in 0..self.node_count {
            let head = self.node_word(node, N_EDGE_REF);
            if !valid_ref(head) {
                return Err(Error::InvalidFormat(format!(
                    "node {node} points at edge {head} beyond edge count {}",
                    self.edge_count
                )));
            }
        }
        let mut shortcuts = 0u32;
        for edge in 0..self.edge_count {
            let [node_a, node_b, link_a, link_b, _, _, _, skip1, skip2, _] = self.raw_edge(edge);
            if node_a >= node_b || node_b >= self.node_count {
                return Err(Error::InvalidFormat(format!(
                    "edge {edge} has invalid endpoints {node_a}, {node_b}"
                )));
            }
            if !valid_ref(link_a) || !valid_ref(link_b) {
                return Err(Error::InvalidFormat(format!("edge {edge} has a dangling link")));
            }
            if skip1 != NO_EDGE {
                if skip1 >= self.edge_count || skip2 >= self.edge_count {
                    return Err(Error::InvalidFormat(format!(
                        "shortcut {edge} skips missing edges {skip1}, {skip2}"
                    )));
                }
                shortcuts += 1;
            }
        }
        if shortcuts != self.shortcut_count {
            return Err(Error::InvalidFormat(format!(
                "header declares {} shortcuts, found {shortcuts}",
                self.shortcut_count
            )));
        }
        Ok(())
    }
}

/// Lazy iterator over one node's edge list
pub struct EdgeIter<'a, D: DataAccess> {
    graph: &'a GraphStorage<D>,
    base: NodeId,
    next: EdgeId,
    direction: Direction,
}

impl<D: DataAccess> Clone for EdgeIter<'_, D> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph,
            base: self.base,
            next: self.next,
            direction: self.direction,
        }
    }
}

impl<D: DataAccess> Iterator for EdgeIter<'_, D> {
    type Item = EdgeView;

    fn next(&mut self) -> Option<EdgeView> {
        while self.next != NO_EDGE {
            let edge = self.next;
            let view = self.graph.view(edge, self.base);
            self.next = if self.base == self.graph.edge_word(edge, E_NODEA) {
                self.graph.edge_word(edge, E_LINKA)
            } else {
                self.graph.edge_word(edge, E_LINKB)
            };
            let accept = match self.direction {
                Direction::Outgoing => view.flags.is_forward(),
                Direction::Incoming => view.flags.is_backward(),
                Direction::Both => true,
            };
            if accept {
                return Some(view);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MmapDirectory;
    use tempfile::TempDir;

    fn adj(graph: &GraphStorage, node: NodeId, direction: Direction) -> Vec<NodeId> {
        let mut out: Vec<_> = graph.edges_of(node, direction).map(|e| e.adj).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_add_edge_links_both_endpoints() {
        let mut g = GraphStorage::new();
        g.add_edge(0, 1, 10, EdgeFlags::both()).unwrap();
        g.add_edge(0, 2, 20, EdgeFlags::both()).unwrap();
        g.add_edge(2, 1, 5, EdgeFlags::both()).unwrap();

        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(adj(&g, 0, Direction::Both), vec![1, 2]);
        assert_eq!(adj(&g, 1, Direction::Both), vec![0, 2]);
        assert_eq!(adj(&g, 2, Direction::Both), vec![0, 1]);
    }

    #[test]
    fn test_one_way_flags_relative_to_anchor() {
        let mut g = GraphStorage::new();
        // stored as 1 -> 3 reversed: canonical order is (1, 3) with backward flag
        let e = g.add_edge(3, 1, 7, EdgeFlags::forward()).unwrap();
        assert_eq!(g.endpoints(e), (1, 3));

        assert_eq!(adj(&g, 3, Direction::Outgoing), vec![1]);
        assert!(adj(&g, 3, Direction::Incoming).is_empty());
        assert_eq!(adj(&g, 1, Direction::Incoming), vec![3]);
        assert!(adj(&g, 1, Direction::Outgoing).is_empty());

        let from_three = g.edge(e, 1).unwrap();
        assert_eq!(from_three.base, 3);
        assert!(from_three.flags.is_forward());
        assert!(!from_three.flags.is_backward());
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut g = GraphStorage::new();
        assert!(matches!(g.add_edge(2, 2, 1, EdgeFlags::both()), Err(Error::SelfLoop(2))));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let mut g = GraphStorage::new();
        for n in 1..=4u32 {
            g.add_edge(0, n, n.into(), EdgeFlags::both()).unwrap();
        }
        let iter = g.edges_of(0, Direction::Outgoing);
        let first: Vec<_> = iter.clone().map(|e| e.edge).collect();
        let second: Vec<_> = iter.map(|e| e.edge).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        // head insertion: newest edge first
        assert_eq!(first[0], 3);
    }

    #[test]
    fn test_shortcut_requires_existing_edges() {
        let mut g = GraphStorage::new();
        let e1 = g.add_edge(0, 1, 3, EdgeFlags::both()).unwrap();
        let e2 = g.add_edge(1, 2, 4, EdgeFlags::both()).unwrap();
        let sc = g.add_shortcut(0, 2, 7, EdgeFlags::both(), (e1, e2), 2).unwrap();
        assert_eq!(g.shortcut_count(), 1);
        let view = g.edge(sc, 2).unwrap();
        assert_eq!(view.skipped, Some((e1, e2)));
        assert_eq!(view.original_edges, 2);
        assert!(g.edge(e1, 1).map(|v| !v.is_shortcut()).unwrap());

        let err = g.add_shortcut(0, 2, 7, EdgeFlags::both(), (e1, 99), 2);
        assert!(matches!(err, Err(Error::MissingSkippedEdge { skipped: 99, .. })));
    }

    #[test]
    fn test_coordinates_and_bounds() {
        let mut g = GraphStorage::new();
        g.set_coordinates(0, 52.5, 13.4, Some(34.2)).unwrap();
        g.set_coordinates(1, 48.1, 11.5, None).unwrap();
        assert!((g.latitude(0) - 52.5).abs() < 1e-7);
        assert!((g.longitude(1) - 11.5).abs() < 1e-7);
        assert_eq!(g.elevation(0), Some(34.2));
        assert_eq!(g.elevation(1), None);
        let (min_lat, min_lon, max_lat, max_lon) = g.bounds().degrees().unwrap();
        assert!((min_lat - 48.1).abs() < 1e-7 && (max_lat - 52.5).abs() < 1e-7);
        assert!((min_lon - 11.5).abs() < 1e-7 && (max_lon - 13.4).abs() < 1e-7);
        assert!(g.set_coordinates(2, 91.0, 0.0, None).is_err());
    }

    #[test]
    fn test_new_nodes_are_uncontracted_and_unlinked() {
        let mut g = GraphStorage::new();
        g.ensure_node(9).unwrap();
        assert_eq!(g.node_count(), 10);
        assert_eq!(g.level(5), 0);
        assert_eq!(g.edges_of(5, Direction::Both).count(), 0);
        assert!(matches!(g.check_node(10), Err(Error::NodeOutOfBounds { node: 10, count: 10 })));
    }

    #[test]
    fn test_weights_beyond_32_bits() {
        let mut g = GraphStorage::new();
        let long = 5_000_000_000_000u64;
        let e = g.add_edge(0, 1, long, EdgeFlags::both()).unwrap();
        assert_eq!(g.edge(e, 1).unwrap().weight, long);
        g.set_weight(e, u64::from(u32::MAX) + 7);
        assert_eq!(g.edge(e, 0).unwrap().weight, u64::from(u32::MAX) + 7);
        assert!(matches!(
            g.add_edge(0, 1, u64::MAX, EdgeFlags::both()),
            Err(Error::WeightOverflow { .. })
        ));
    }

    #[test]
    fn test_debug_shows_counts() {
        let mut g = GraphStorage::new();
        g.add_edge(0, 1, 1, EdgeFlags::both()).unwrap();
        let text = format!("{g:?}");
        assert!(text.contains("nodes: 2"));
        assert!(text.contains("edges: 1"));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_range_access_panics() {
        let g = GraphStorage::new();
        g.level(0);
    }

    #[test]
    fn test_mmap_backed_graph() {
        let dir = TempDir::new().unwrap();
        let directory = MmapDirectory::new(dir.path()).unwrap();
        let mut g = GraphStorage::create(&directory).unwrap();
        for n in 0..2000u32 {
            g.add_edge(n, n + 1, n.into(), EdgeFlags::forward()).unwrap();
        }
        g.flush().unwrap();
        assert_eq!(g.edge_count(), 2000);
        let out: Vec<_> = g.edges_of(1000, Direction::Outgoing).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].adj, 1001);
        assert_eq!(out[0].weight, 1000);
        g.check_structure().unwrap();
    }
}
