//! Plain unidirectional Dijkstra over base edges (ground truth for validation)

use butterfly_common::Result;

use super::filter::EdgeFilter;
use super::route::{PathEdge, Route};
use super::search_state::SearchState;
use crate::storage::{DataAccess, Direction, GraphStorage, NodeId, RamDataAccess};

pub struct Dijkstra<'a, D: DataAccess = RamDataAccess> {
    graph: &'a GraphStorage<D>,
    state: SearchState,
    filter: EdgeFilter,
}

impl<'a, D: DataAccess> Dijkstra<'a, D> {
    /// Search base edges only, ignoring shortcuts and levels
    pub fn new(graph: &'a GraphStorage<D>) -> Self {
        Self {
            graph,
            state: SearchState::new(graph.node_count() as usize),
            filter: if graph.shortcut_count() == 0 {
                EdgeFilter::All
            } else {
                EdgeFilter::BaseOnly
            },
        }
    }

    pub fn route(&mut self, source: NodeId, target: NodeId) -> Result<Option<Route>> {
        if self.graph.node_count() == 0 {
            return Ok(None);
        }
        self.graph.check_node(source)?;
        self.graph.check_node(target)?;

        self.state.reset();
        self.state.start(source);
        let mut found = None;
        while let Some((node, dist)) = self.state.pop() {
            if node == target {
                found = Some(dist);
                break;
            }
            for edge in self.graph.edges_of(node, Direction::Outgoing) {
                if !self.filter.accept(self.graph, &edge) {
                    continue;
                }
                self.state.relax(edge.adj, dist.saturating_add(edge.weight), (node, edge.edge));
            }
        }

        let Some(weight) = found else {
            return Ok(None);
        };
        let edges = self
            .state
            .path_to(target)
            .into_iter()
            .map(|(from, edge, to)| PathEdge {
                edge,
                from,
                to,
                weight: self.graph.edge(edge, to).map_or(0, |e| e.weight),
            })
            .collect();
        Ok(Some(Route::from_edges(source, target, weight, edges, self.state.settled())))
    }
}
