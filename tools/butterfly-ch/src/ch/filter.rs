//! Edge filters applied while exploring the graph

use crate::storage::{DataAccess, EdgeView, GraphStorage, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter {
    /// Every edge
    All,
    /// Edges whose adjacent node has a level `>=` the base node (CH query)
    LevelUp,
    /// Edges into uncontracted nodes other than the given one (witness search)
    SkipNode(NodeId),
    /// Base edges only, no shortcuts (plain Dijkstra)
    BaseOnly,
}

impl EdgeFilter {
    #[inline]
    pub fn accept<D: DataAccess>(&self, graph: &GraphStorage<D>, edge: &EdgeView) -> bool {
        match *self {
            EdgeFilter::All => true,
            EdgeFilter::LevelUp => graph.level(edge.adj) >= graph.level(edge.base),
            EdgeFilter::SkipNode(skip) => edge.adj != skip && graph.level(edge.adj) == 0,
            EdgeFilter::BaseOnly => !edge.is_shortcut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Direction, EdgeFlags};

    #[test]
    fn test_level_up_and_skip_node() {
        let mut g = GraphStorage::new();
        g.add_edge(0, 1, 1, EdgeFlags::both()).unwrap();
        g.add_edge(0, 2, 1, EdgeFlags::both()).unwrap();
        g.set_level(1, 3);
        g.set_level(0, 2);

        let accepted = |filter: EdgeFilter| -> Vec<NodeId> {
            let mut adj: Vec<_> = g
                .edges_of(0, Direction::Outgoing)
                .filter(|e| filter.accept(&g, e))
                .map(|e| e.adj)
                .collect();
            adj.sort_unstable();
            adj
        };
        assert_eq!(accepted(EdgeFilter::All), vec![1, 2]);
        assert_eq!(accepted(EdgeFilter::LevelUp), vec![1]);
        // node 1 is contracted
        assert_eq!(accepted(EdgeFilter::SkipNode(2)), Vec::<NodeId>::new());
        assert_eq!(accepted(EdgeFilter::SkipNode(5)), vec![2]);
    }
}
