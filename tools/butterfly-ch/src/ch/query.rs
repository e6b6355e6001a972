//! Level-filtered bidirectional Dijkstra on a contracted graph
//!
//! The forward search from the source only follows outgoing edges towards nodes of higher
//! level, the backward search from the target only incoming edges from nodes of higher level.
//! Both meet at the highest node of the shortest path. Each direction stops once its next key
//! is at least the best meeting weight found so far.

use butterfly_common::Result;
use tracing::debug;

use super::config::QueryConfig;
use super::filter::EdgeFilter;
use super::route::{PathEdge, Route};
use super::search_state::{SearchState, INFINITY};
use super::unpack::unpack_edge;
use crate::storage::{DataAccess, Direction, EdgeId, GraphStorage, NodeId, RamDataAccess};

/// Reusable query over a shared graph; one per thread
pub struct ChQuery<'a, D: DataAccess = RamDataAccess> {
    graph: &'a GraphStorage<D>,
    forward: SearchState,
    backward: SearchState,
    config: QueryConfig,
}

impl<'a, D: DataAccess> ChQuery<'a, D> {
    pub fn new(graph: &'a GraphStorage<D>) -> Self {
        Self::with_config(graph, QueryConfig::default())
    }

    pub fn with_config(graph: &'a GraphStorage<D>, config: QueryConfig) -> Self {
        let n = graph.node_count() as usize;
        Self {
            graph,
            forward: SearchState::new(n),
            backward: SearchState::new(n),
            config,
        }
    }

    /// Shortest route from `source` to `target`.
    ///
    /// `Ok(None)` when the target is unreachable, the graph is empty or the settled-node
    /// budget ran out. Unknown node ids are an error.
    pub fn route(&mut self, source: NodeId, target: NodeId) -> Result<Option<Route>> {
        if self.graph.node_count() == 0 {
            return Ok(None);
        }
        self.graph.check_node(source)?;
        self.graph.check_node(target)?;
        if source == target {
            return Ok(Some(Route::trivial(source)));
        }

        let Some((weight, meeting)) = self.search(source, target) else {
            return Ok(None);
        };

        let mut hops: Vec<(NodeId, EdgeId, NodeId)> = self.forward.path_to(meeting);
        let mut current = meeting;
        while let Some((next, edge)) = self.backward.parent(current) {
            hops.push((current, edge, next));
            current = next;
        }

        let mut edges: Vec<PathEdge> = Vec::with_capacity(hops.len() * 2);
        for (from, edge, to) in hops {
            unpack_edge(self.graph, edge, from, to, &mut edges)?;
        }
        let settled = self.forward.settled() + self.backward.settled();
        Ok(Some(Route::from_edges(source, target, weight, edges, settled)))
    }

    /// Route weight only, no unpacking
    pub fn weight(&mut self, source: NodeId, target: NodeId) -> Result<Option<u64>> {
        if self.graph.node_count() == 0 {
            return Ok(None);
        }
        self.graph.check_node(source)?;
        self.graph.check_node(target)?;
        if source == target {
            return Ok(Some(0));
        }
        Ok(self.search(source, target).map(|(weight, _)| weight))
    }

    /// Run both searches; returns the best weight and the meeting node
    fn search(&mut self, source: NodeId, target: NodeId) -> Option<(u64, NodeId)> {
        self.forward.reset();
        self.backward.reset();
        self.forward.start(source);
        self.backward.start(target);

        let filter = EdgeFilter::LevelUp;
        let mut best = INFINITY;
        let mut meeting = None;

        loop {
            let fwd_min = self.forward.min_key();
            let bwd_min = self.backward.min_key();
            let fwd_active = fwd_min < best;
            let bwd_active = bwd_min < best;
            if !fwd_active && !bwd_active {
                break;
            }

            if let Some(limit) = self.config.max_settled_nodes {
                let settled = self.forward.settled() + self.backward.settled();
                if settled >= limit {
                    debug!(source, target, settled, "query budget exhausted");
                    return None;
                }
            }

            let forward = fwd_active && (!bwd_active || fwd_min <= bwd_min);
            let (this, other, direction) = if forward {
                (&mut self.forward, &self.backward, Direction::Outgoing)
            } else {
                (&mut self.backward, &self.forward, Direction::Incoming)
            };

            let Some((node, dist)) = this.pop() else {
                break;
            };
            let other_dist = other.dist(node);
            if other_dist != INFINITY && dist.saturating_add(other_dist) < best {
                best = dist.saturating_add(other_dist);
                meeting = Some(node);
            }

            for edge in self.graph.edges_of(node, direction) {
                if !filter.accept(self.graph, &edge) {
                    continue;
                }
                let next = dist.saturating_add(edge.weight);
                if this.relax(edge.adj, next, (node, edge.edge)) {
                    let other_dist = other.dist(edge.adj);
                    if other_dist != INFINITY && next.saturating_add(other_dist) < best {
                        best = next.saturating_add(other_dist);
                        meeting = Some(edge.adj);
                    }
                }
            }
        }

        meeting.map(|m| (best, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::config::ContractionConfig;
    use crate::ch::preparation::prepare;
    use crate::storage::EdgeFlags;
    use butterfly_common::Error;

    fn contracted_line(n: u32) -> GraphStorage {
        let mut g = GraphStorage::new();
        for i in 0..n - 1 {
            g.add_edge(i, i + 1, 1, EdgeFlags::both()).unwrap();
        }
        prepare(&mut g, &ContractionConfig::default()).unwrap();
        g
    }

    #[test]
    fn test_line_route() {
        let g = contracted_line(5);
        let mut query = ChQuery::new(&g);
        let route = query.route(0, 4).unwrap().unwrap();
        assert_eq!(route.weight, 4);
        let hops: Vec<_> = route.edges.iter().map(|e| (e.from, e.to)).collect();
        assert_eq!(hops, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
        assert_eq!(route.nodes, vec![0, 1, 2, 3, 4]);

        let back = query.route(4, 0).unwrap().unwrap();
        assert_eq!(back.weight, 4);
        assert!(back.is_chained());
    }

    #[test]
    fn test_self_query() {
        let mut g = GraphStorage::new();
        g.ensure_node(0).unwrap();
        prepare(&mut g, &ContractionConfig::default()).unwrap();
        let route = ChQuery::new(&g).route(0, 0).unwrap().unwrap();
        assert_eq!(route.weight, 0);
        assert!(route.edges.is_empty());
    }

    #[test]
    fn test_disconnected_is_not_found() {
        let mut g = GraphStorage::new();
        g.add_edge(0, 1, 1, EdgeFlags::both()).unwrap();
        g.add_edge(2, 3, 1, EdgeFlags::both()).unwrap();
        prepare(&mut g, &ContractionConfig::default()).unwrap();
        let mut query = ChQuery::new(&g);
        assert_eq!(query.route(0, 3).unwrap(), None);
        assert_eq!(query.weight(1, 2).unwrap(), None);
        assert_eq!(query.weight(0, 1).unwrap(), Some(1));
    }

    #[test]
    fn test_one_way_respected() {
        let mut g = GraphStorage::new();
        g.add_edge(0, 1, 1, EdgeFlags::forward()).unwrap();
        g.add_edge(1, 2, 1, EdgeFlags::forward()).unwrap();
        g.add_edge(2, 0, 10, EdgeFlags::forward()).unwrap();
        prepare(&mut g, &ContractionConfig::default()).unwrap();
        let mut query = ChQuery::new(&g);
        assert_eq!(query.weight(0, 2).unwrap(), Some(2));
        assert_eq!(query.weight(2, 1).unwrap(), Some(11));
        assert_eq!(query.weight(1, 0).unwrap(), Some(11));
    }

    #[test]
    fn test_empty_graph_and_bounds() {
        let g = GraphStorage::new();
        assert_eq!(ChQuery::new(&g).route(0, 1).unwrap(), None);

        let g = contracted_line(3);
        let err = ChQuery::new(&g).route(0, 7).unwrap_err();
        assert!(matches!(err, Error::NodeOutOfBounds { node: 7, count: 3 }));
    }

    #[test]
    fn test_settled_budget() {
        let g = contracted_line(50);
        let config = QueryConfig {
            max_settled_nodes: Some(1),
        };
        let mut query = ChQuery::with_config(&g, config);
        assert_eq!(query.route(0, 49).unwrap(), None);
    }
}
