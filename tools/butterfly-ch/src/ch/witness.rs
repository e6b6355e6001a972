//! Bounded one-to-many witness search
//!
//! Explores from an in-neighbor `u` of the node being contracted, never entering that node or
//! any contracted node. Stops once every goal is settled, the next key exceeds the largest
//! candidate weight, or the settled-node budget is spent.

use tracing::debug;

use super::filter::EdgeFilter;
use super::search_state::{SearchState, INFINITY};
use crate::storage::{DataAccess, Direction, GraphStorage, NodeId};

pub struct WitnessSearch {
    state: SearchState,
    settled_limit: Option<usize>,
    remaining: Vec<NodeId>,
    exhausted: bool,
    pub(crate) searches: u64,
    pub(crate) budget_hits: u64,
}

impl WitnessSearch {
    pub fn new(n_nodes: usize, settled_limit: Option<usize>) -> Self {
        Self {
            state: SearchState::new(n_nodes),
            settled_limit,
            remaining: Vec::new(),
            exhausted: false,
            searches: 0,
            budget_hits: 0,
        }
    }

    /// Budget of settled nodes for the following runs, `None` = unlimited
    pub fn set_settled_limit(&mut self, settled_limit: Option<usize>) {
        self.settled_limit = settled_limit;
    }

    /// Search from `source` without passing `skip`.
    ///
    /// Afterwards [`Self::dist`] returns an upper bound of the shortest witness weight to each
    /// goal (`INFINITY` if none was reached). Returns `false` if the budget ran out; goals not
    /// settled by then have no witness.
    pub fn run<D: DataAccess>(
        &mut self,
        graph: &GraphStorage<D>,
        source: NodeId,
        skip: NodeId,
        goals: &[NodeId],
        max_weight: u64,
    ) -> bool {
        self.searches += 1;
        self.exhausted = false;
        self.state.ensure_nodes(graph.node_count() as usize);
        self.state.reset();
        self.state.start(source);

        self.remaining.clear();
        self.remaining.extend(goals.iter().copied().filter(|&g| g != source));
        let filter = EdgeFilter::SkipNode(skip);

        while !self.remaining.is_empty() {
            if self.state.min_key() > max_weight {
                break;
            }
            if let Some(limit) = self.settled_limit {
                if self.state.settled() >= limit {
                    self.budget_hits += 1;
                    self.exhausted = true;
                    debug!(
                        source,
                        skip,
                        settled = self.state.settled(),
                        "witness search budget exhausted"
                    );
                    return false;
                }
            }
            let Some((node, dist)) = self.state.pop() else {
                break;
            };
            if let Some(pos) = self.remaining.iter().position(|&g| g == node) {
                self.remaining.swap_remove(pos);
            }
            for edge in graph.edges_of(node, Direction::Outgoing) {
                if !filter.accept(graph, &edge) {
                    continue;
                }
                let next = dist.saturating_add(edge.weight);
                self.state.relax(edge.adj, next, (node, edge.edge));
            }
        }
        true
    }

    /// Best known witness weight to `node` from the last run
    #[inline]
    pub fn dist(&self, node: NodeId) -> u64 {
        self.state.dist(node)
    }

    /// `true` if the last run found a path to `goal` no heavier than `candidate`
    #[inline]
    pub fn has_witness(&self, goal: NodeId, candidate: u64) -> bool {
        if self.exhausted && self.remaining.contains(&goal) {
            return false;
        }
        let dist = self.dist(goal);
        dist != INFINITY && dist <= candidate
    }
}
