//! Shortcut discovery for a single node and the priority derived from it

use rustc_hash::FxHashMap;

use super::config::ContractionConfig;
use super::witness::WitnessSearch;
use crate::storage::{DataAccess, Direction, EdgeFlags, EdgeId, GraphStorage, NodeId};

/// A shortcut that contracting a node would require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: u64,
    /// `forward`, or `both` when `to -> from` needs the same shortcut
    pub flags: EdgeFlags,
    /// Replaced edges: the first touches `from`, the second touches `to`
    pub skipped: (EdgeId, EdgeId),
    pub original_edges: u32,
}

/// Cheapest edge between the contracted node and one neighbor
#[derive(Debug, Clone, Copy)]
struct NeighborEdge {
    node: NodeId,
    edge: EdgeId,
    weight: u64,
    original_edges: u32,
}

/// Keep only the cheapest edge per neighbor, skipping contracted neighbors
fn cheapest_per_neighbor<D: DataAccess>(
    graph: &GraphStorage<D>,
    node: NodeId,
    direction: Direction,
    out: &mut Vec<NeighborEdge>,
) {
    out.clear();
    let mut index: FxHashMap<NodeId, usize> = FxHashMap::default();
    for edge in graph.edges_of(node, direction) {
        if graph.level(edge.adj) != 0 {
            continue;
        }
        let candidate = NeighborEdge {
            node: edge.adj,
            edge: edge.edge,
            weight: edge.weight,
            original_edges: edge.original_edges,
        };
        match index.get(&edge.adj) {
            Some(&i) if out[i].weight <= candidate.weight => {}
            Some(&i) => out[i] = candidate,
            None => {
                index.insert(edge.adj, out.len());
                out.push(candidate);
            }
        }
    }
}

/// Finds the shortcuts of a node without modifying the graph.
///
/// One instance per thread: it owns the witness search state.
pub struct ShortcutFinder {
    witness: WitnessSearch,
    incoming: Vec<NeighborEdge>,
    outgoing: Vec<NeighborEdge>,
    goals: Vec<NodeId>,
    candidates: Vec<Shortcut>,
    edge_difference_weight: i64,
    original_edges_weight: i64,
    contracted_neighbors_weight: i64,
}

impl ShortcutFinder {
    pub fn new(n_nodes: usize, config: &ContractionConfig) -> Self {
        Self {
            witness: WitnessSearch::new(n_nodes, None),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            goals: Vec::new(),
            candidates: Vec::new(),
            edge_difference_weight: config.edge_difference_weight,
            original_edges_weight: config.original_edges_weight,
            contracted_neighbors_weight: config.contracted_neighbors_weight,
        }
    }

    pub fn witness_searches(&self) -> u64 {
        self.witness.searches
    }

    pub fn budget_hits(&self) -> u64 {
        self.witness.budget_hits
    }

    /// Shortcuts needed if `v` were contracted now, witness searches limited to
    /// `settled_limit` settled nodes each
    pub fn find<D: DataAccess>(
        &mut self,
        graph: &GraphStorage<D>,
        v: NodeId,
        settled_limit: Option<usize>,
    ) -> &[Shortcut] {
        self.candidates.clear();
        self.witness.set_settled_limit(settled_limit);
        cheapest_per_neighbor(graph, v, Direction::Incoming, &mut self.incoming);
        cheapest_per_neighbor(graph, v, Direction::Outgoing, &mut self.outgoing);

        for i in 0..self.incoming.len() {
            let u = self.incoming[i];
            self.goals.clear();
            let mut max_weight = 0;
            for w in &self.outgoing {
                if w.node == u.node {
                    continue;
                }
                self.goals.push(w.node);
                max_weight = max_weight.max(u.weight.saturating_add(w.weight));
            }
            if self.goals.is_empty() {
                continue;
            }

            self.witness.run(graph, u.node, v, &self.goals, max_weight);

            for w in &self.outgoing {
                if w.node == u.node {
                    continue;
                }
                let weight = u.weight.saturating_add(w.weight);
                if self.witness.has_witness(w.node, weight) {
                    continue;
                }
                self.candidates.push(Shortcut {
                    from: u.node,
                    to: w.node,
                    weight,
                    flags: EdgeFlags::forward(),
                    skipped: (u.edge, w.edge),
                    original_edges: u.original_edges + w.original_edges,
                });
            }
        }

        merge_opposite_directions(&mut self.candidates);
        &self.candidates
    }

    /// `a * (|shortcuts| - degree) + b * sum(original edges) + c * contracted neighbors`
    pub fn priority<D: DataAccess>(
        &mut self,
        graph: &GraphStorage<D>,
        v: NodeId,
        settled_limit: Option<usize>,
    ) -> i64 {
        let (shortcut_count, original_edges) = {
            let shortcuts = self.find(graph, v, settled_limit);
            let original: i64 = shortcuts.iter().map(|sc| sc.original_edges as i64).sum();
            (shortcuts.len() as i64, original)
        };

        let mut degree = 0i64;
        let mut contracted_neighbors = 0i64;
        for edge in graph.edges_of(v, Direction::Both) {
            if graph.level(edge.adj) != 0 {
                contracted_neighbors += 1;
            } else {
                degree += 1;
            }
        }

        self.edge_difference_weight * (shortcut_count - degree)
            + self.original_edges_weight * original_edges
            + self.contracted_neighbors_weight * contracted_neighbors
    }
}

/// Fold `w -> u` into `u -> w` when both run through the same two edges with the same weight
fn merge_opposite_directions(candidates: &mut Vec<Shortcut>) {
    let mut index: FxHashMap<(NodeId, NodeId), usize> = FxHashMap::default();
    let mut merged = vec![false; candidates.len()];
    for i in 0..candidates.len() {
        let sc = candidates[i];
        if let Some(&j) = index.get(&(sc.to, sc.from)) {
            let other = candidates[j];
            let same_edges = other.skipped == (sc.skipped.1, sc.skipped.0);
            if !other.flags.is_both() && other.weight == sc.weight && same_edges {
                candidates[j].flags = EdgeFlags::both();
                merged[i] = true;
                continue;
            }
        }
        index.insert((sc.from, sc.to), i);
    }
    let mut i = 0;
    candidates.retain(|_| {
        let keep = !merged[i];
        i += 1;
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u32) -> GraphStorage {
        let mut g = GraphStorage::new();
        for i in 0..n - 1 {
            g.add_edge(i, i + 1, 1, EdgeFlags::both()).unwrap();
        }
        g
    }

    #[test]
    fn test_middle_of_line_needs_one_two_way_shortcut() {
        let g = line(5);
        let mut finder = ShortcutFinder::new(5, &ContractionConfig::default());
        let shortcuts = finder.find(&g, 2, None).to_vec();
        assert_eq!(shortcuts.len(), 1);
        let sc = shortcuts[0];
        assert!(sc.flags.is_both());
        assert_eq!(sc.weight, 2);
        assert_eq!(sc.original_edges, 2);
        let mut ends = [sc.from, sc.to];
        ends.sort_unstable();
        assert_eq!(ends, [1, 3]);
    }

    #[test]
    fn test_end_of_line_needs_no_shortcut() {
        let g = line(5);
        let mut finder = ShortcutFinder::new(5, &ContractionConfig::default());
        assert!(finder.find(&g, 0, None).is_empty());
    }

    #[test]
    fn test_one_way_chain_gives_one_way_shortcut() {
        let mut g = GraphStorage::new();
        g.add_edge(0, 1, 3, EdgeFlags::forward()).unwrap();
        g.add_edge(1, 2, 4, EdgeFlags::forward()).unwrap();
        let mut finder = ShortcutFinder::new(3, &ContractionConfig::default());
        let shortcuts = finder.find(&g, 1, None).to_vec();
        assert_eq!(shortcuts.len(), 1);
        assert_eq!((shortcuts[0].from, shortcuts[0].to), (0, 2));
        assert!(!shortcuts[0].flags.is_both());
        assert_eq!(shortcuts[0].weight, 7);
    }

    #[test]
    fn test_witness_suppresses_shortcut() {
        // triangle: 0 - 1 - 2 costs 2, direct 0 - 2 costs 2
        let mut g = line(3);
        g.add_edge(0, 2, 2, EdgeFlags::both()).unwrap();
        let mut finder = ShortcutFinder::new(3, &ContractionConfig::default());
        assert!(finder.find(&g, 1, None).is_empty());
    }

    #[test]
    fn test_priority_of_line_nodes() {
        let g = line(5);
        let mut finder = ShortcutFinder::new(5, &ContractionConfig::default());
        // end node: 0 shortcuts, degree 1 → 2 * (0 - 1)
        assert_eq!(finder.priority(&g, 0, None), -2);
        // middle node: 1 shortcut (2 original edges), degree 2 → 2 * (1 - 2) + 4 * 2
        assert_eq!(finder.priority(&g, 2, None), 6);
    }
}
