//! Contraction Hierarchies preparation
//!
//! Pipeline:
//! 1. Weighting pass: base-edge distances become routing weights
//! 2. Initial priorities (parallel, one witness search state per rayon worker)
//! 3. Contraction loop with lazy updates, neighbor updates and periodic full updates
//!
//! Node ordering is by priority with ties broken by node id, so a run is deterministic.

use butterfly_common::{Error, Result};
use priority_queue::PriorityQueue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Reverse;
use std::time::{Duration, Instant};

use super::config::ContractionConfig;
use super::shortcuts::{Shortcut, ShortcutFinder};
use crate::storage::{DataAccess, Direction, EdgeId, GraphStorage, NodeId};
use crate::weighting::Weighting;

/// Coarse progress reported to the caller during contraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractionProgress {
    pub contracted: u32,
    pub remaining: u32,
    pub shortcuts: u64,
}

/// Counters and timings of one preparation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContractionStats {
    pub nodes: u32,
    pub base_edges: u32,
    pub shortcuts_added: u64,
    pub shortcuts_updated: u64,
    pub lazy_reinserts: u64,
    pub neighbor_updates: u64,
    pub periodic_updates: u32,
    pub witness_searches: u64,
    pub witness_budget_hits: u64,
    pub max_level: u32,
    /// Running mean degree of the contracted nodes when contraction finished
    pub mean_degree: f64,
    pub weighting_time: Duration,
    pub initial_priority_time: Duration,
    pub lazy_time: Duration,
    pub contraction_time: Duration,
    pub neighbor_time: Duration,
    pub periodic_time: Duration,
    pub total_time: Duration,
}

impl ContractionStats {
    pub fn print(&self) {
        println!("\n=== CONTRACTION SUMMARY ===");
        println!("  Nodes:            {}", self.nodes);
        println!("  Base edges:       {}", self.base_edges);
        println!("  Shortcuts added:  {}", self.shortcuts_added);
        println!("  Shortcuts updated:{}", self.shortcuts_updated);
        println!("  Lazy re-inserts:  {}", self.lazy_reinserts);
        println!("  Neighbor updates: {}", self.neighbor_updates);
        println!("  Periodic updates: {}", self.periodic_updates);
        println!(
            "  Witness searches: {} ({} hit the settled limit)",
            self.witness_searches, self.witness_budget_hits
        );
        println!("  Max level:        {}", self.max_level);
        println!("  Mean degree:      {:.2}", self.mean_degree);
        println!("  Timings:");
        println!("    weighting:        {:.2?}", self.weighting_time);
        println!("    initial priority: {:.2?}", self.initial_priority_time);
        println!("    lazy updates:     {:.2?}", self.lazy_time);
        println!("    contraction:      {:.2?}", self.contraction_time);
        println!("    neighbor updates: {:.2?}", self.neighbor_time);
        println!("    periodic updates: {:.2?}", self.periodic_time);
        println!("    total:            {:.2?}", self.total_time);
    }
}

/// Outcome of writing one shortcut into the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutInsert {
    Added(EdgeId),
    /// An existing shortcut with the same endpoints and direction got a smaller weight
    Updated(EdgeId),
    /// An identical or cheaper shortcut already exists
    Unchanged(EdgeId),
}

/// Replace base-edge distances with weights. Fails if the graph is already weighted.
pub fn apply_weighting<D: DataAccess>(
    graph: &mut GraphStorage<D>,
    weighting: Weighting,
    default_speed_kmh: u32,
) -> Result<()> {
    if let Some(existing) = graph.weighting() {
        return Err(Error::InvalidInput(format!(
            "graph is already weighted ({existing})"
        )));
    }
    let updates: Vec<(EdgeId, u64)> = graph
        .all_edges()
        .filter(|e| !e.is_shortcut())
        .map(|e| (e.edge, weighting.weight(e.weight, e.flags, default_speed_kmh)))
        .collect();
    for (edge, weight) in updates {
        graph.set_weight(edge, weight);
    }
    graph.set_weighting(weighting);
    Ok(())
}

/// Write `sc` into the graph, decreasing an existing shortcut in place when possible
pub fn insert_or_update_shortcut<D: DataAccess>(
    graph: &mut GraphStorage<D>,
    sc: &Shortcut,
) -> Result<ShortcutInsert> {
    let weight = sc.weight;
    let existing = graph
        .edges_of(sc.from, Direction::Both)
        .find(|e| e.is_shortcut() && e.adj == sc.to && e.flags.direction() == sc.flags.direction());

    match existing {
        Some(e) if e.weight > weight => {
            graph.update_shortcut(e.edge, weight, sc.skipped, sc.original_edges)?;
            Ok(ShortcutInsert::Updated(e.edge))
        }
        Some(e) => Ok(ShortcutInsert::Unchanged(e.edge)),
        None => {
            let edge = graph.add_shortcut(sc.from, sc.to, weight, sc.flags, sc.skipped, sc.original_edges)?;
            Ok(ShortcutInsert::Added(edge))
        }
    }
}

/// `percentage` of `n`, at least 1; `None` when disabled
fn every(n: u32, percentage: u32) -> Option<u32> {
    (percentage > 0).then(|| ((n as u64 * percentage as u64 / 100) as u32).max(1))
}

/// Give a queued node a new priority. A node missing from the queue means the
/// contraction bookkeeping is broken.
pub(crate) fn rekey(
    queue: &mut PriorityQueue<NodeId, Reverse<(i64, NodeId)>>,
    node: NodeId,
    priority: i64,
) -> Result<()> {
    match queue.change_priority(&node, Reverse((priority, node))) {
        Some(_) => Ok(()),
        None => Err(Error::QueueInconsistency(format!("node {node} is not queued"))),
    }
}

/// Exclusive preparation context: the only writer of the graph while it runs
pub struct Preparation<'a, D: DataAccess> {
    graph: &'a mut GraphStorage<D>,
    config: ContractionConfig,
    queue: PriorityQueue<NodeId, Reverse<(i64, NodeId)>>,
    stats: ContractionStats,
    /// Drives the witness budgets, see [`ContractionConfig::heuristic_limit`]
    mean_degree: f64,
}

impl<'a, D: DataAccess> Preparation<'a, D> {
    pub fn new(graph: &'a mut GraphStorage<D>, config: ContractionConfig) -> Result<Self> {
        config.validate()?;
        if graph.is_contracted() {
            return Err(Error::InvalidInput("graph is already contracted".to_string()));
        }
        if let Some(existing) = graph.weighting() {
            if existing != config.weighting {
                return Err(Error::InvalidInput(format!(
                    "graph is weighted with {existing}, config asks for {}",
                    config.weighting
                )));
            }
        }
        Ok(Self {
            graph,
            config,
            queue: PriorityQueue::new(),
            stats: ContractionStats::default(),
            mean_degree: 0.0,
        })
    }

    pub fn run(self) -> Result<ContractionStats> {
        self.run_with_progress(|_| {})
    }

    /// Contract every node. `progress` is called roughly every percent and once at the end.
    pub fn run_with_progress<F: FnMut(ContractionProgress)>(mut self, mut progress: F) -> Result<ContractionStats> {
        let total_start = Instant::now();
        let n = self.graph.node_count();
        self.stats.nodes = n;
        self.stats.base_edges = self.graph.base_edge_count();

        tracing::info!(
            nodes = n,
            edges = self.stats.base_edges,
            weighting = %self.config.weighting,
            "starting contraction"
        );

        if self.graph.weighting().is_none() {
            let t = Instant::now();
            apply_weighting(self.graph, self.config.weighting, self.config.default_speed_kmh)?;
            self.stats.weighting_time = t.elapsed();
        }

        self.mean_degree = self.stats.base_edges as f64 / n.max(1) as f64;

        if n == 0 {
            self.graph.mark_contracted();
            self.stats.total_time = total_start.elapsed();
            return Ok(self.stats);
        }

        let t = Instant::now();
        self.initial_priorities();
        self.stats.initial_priority_time = t.elapsed();
        let queued = self.queue.len() as u32;

        let mut finder = ShortcutFinder::new(n as usize, &self.config);
        let periodic_every = every(n, self.config.periodic_updates_percentage);
        let log_every = every(n, self.config.log_messages_percentage);
        let progress_every = (n / 100).max(1);
        // lazy updates only once the queue is shorter than this
        let lazy_below = (n as f64 * self.config.last_lazy_nodes_updates_percentage as f64 / 100.0).round() as usize;
        let neighbor_pct = self.config.neighbor_updates_percentage;
        let mut rng = StdRng::seed_from_u64(123);

        let mut level = 1u32;
        let mut neighbors: Vec<NodeId> = Vec::new();

        while let Some((v, _)) = self.queue.pop() {
            // Lazy update: v may have become more important since it was keyed
            if !self.queue.is_empty() && self.queue.len() < lazy_below {
                let t = Instant::now();
                let priority = finder.priority(self.graph, v, self.config.heuristic_limit(self.mean_degree));
                self.stats.lazy_time += t.elapsed();
                if let Some((_, Reverse((min, _)))) = self.queue.peek() {
                    if priority > *min {
                        self.queue.push(v, Reverse((priority, v)));
                        self.stats.lazy_reinserts += 1;
                        continue;
                    }
                }
            }

            let t = Instant::now();
            let limit = self.config.contraction_limit(self.mean_degree);
            let shortcuts = finder.find(self.graph, v, limit).to_vec();
            for sc in &shortcuts {
                match insert_or_update_shortcut(self.graph, sc)? {
                    ShortcutInsert::Added(_) => self.stats.shortcuts_added += 1,
                    ShortcutInsert::Updated(_) => self.stats.shortcuts_updated += 1,
                    ShortcutInsert::Unchanged(_) => {}
                }
            }
            self.graph.set_level(v, level);
            self.stats.contraction_time += t.elapsed();

            let t = Instant::now();
            neighbors.clear();
            neighbors.extend(
                self.graph
                    .edges_of(v, Direction::Both)
                    .map(|e| e.adj)
                    .filter(|&adj| self.graph.level(adj) == 0),
            );
            let degree = neighbors.len();
            neighbors.sort_unstable();
            neighbors.dedup();
            self.mean_degree = (self.mean_degree * 2.0 + degree as f64) / 3.0;
            let limit = self.config.heuristic_limit(self.mean_degree);
            for &nb in &neighbors {
                if neighbor_pct < 100 && rng.random_range(0..100) >= neighbor_pct {
                    continue;
                }
                let p = finder.priority(self.graph, nb, limit);
                rekey(&mut self.queue, nb, p)?;
                self.stats.neighbor_updates += 1;
            }
            self.stats.neighbor_time += t.elapsed();

            let contracted = level;
            level += 1;

            if periodic_every.is_some_and(|k| contracted % k == 0) && !self.queue.is_empty() {
                let t = Instant::now();
                self.update_all(&mut finder)?;
                self.stats.periodic_updates += 1;
                self.stats.periodic_time += t.elapsed();
            }

            let shortcuts_total = self.stats.shortcuts_added;
            if log_every.is_some_and(|k| contracted % k == 0) {
                tracing::info!(
                    contracted,
                    remaining = self.queue.len(),
                    shortcuts = shortcuts_total,
                    lazy_reinserts = self.stats.lazy_reinserts,
                    periodic_updates = self.stats.periodic_updates,
                    "contraction progress"
                );
            }
            if contracted % progress_every == 0 {
                progress(ContractionProgress {
                    contracted,
                    remaining: self.queue.len() as u32,
                    shortcuts: shortcuts_total,
                });
            }
        }

        if level - 1 != queued {
            return Err(Error::QueueInconsistency(format!(
                "contracted {} of {} queued nodes",
                level - 1,
                queued
            )));
        }

        self.graph.mark_contracted();
        self.stats.max_level = level - 1;
        self.stats.mean_degree = self.mean_degree;
        self.stats.witness_searches = finder.witness_searches();
        self.stats.witness_budget_hits = finder.budget_hits();
        self.stats.total_time = total_start.elapsed();
        progress(ContractionProgress {
            contracted: n,
            remaining: 0,
            shortcuts: self.stats.shortcuts_added,
        });

        tracing::info!(
            shortcuts_added = self.stats.shortcuts_added,
            shortcuts_updated = self.stats.shortcuts_updated,
            lazy_reinserts = self.stats.lazy_reinserts,
            elapsed = ?self.stats.total_time,
            "contraction finished"
        );
        Ok(self.stats)
    }

    /// Priority of every uncontracted node, computed in parallel
    fn initial_priorities(&mut self) {
        let n = self.graph.node_count();
        let graph: &GraphStorage<D> = self.graph;
        let config = &self.config;
        let limit = config.heuristic_limit(self.mean_degree);
        let priorities: Vec<(NodeId, i64)> = (0..n)
            .into_par_iter()
            .filter(|&v| graph.level(v) == 0)
            .map_init(
                || ShortcutFinder::new(n as usize, config),
                |finder, v| (v, finder.priority(graph, v, limit)),
            )
            .collect();

        self.queue = PriorityQueue::with_capacity(priorities.len());
        for (v, p) in priorities {
            self.queue.push(v, Reverse((p, v)));
        }
    }

    /// Recompute the priority of every queued node
    fn update_all(&mut self, finder: &mut ShortcutFinder) -> Result<()> {
        let queued: Vec<NodeId> = self.queue.iter().map(|(&v, _)| v).collect();
        let limit = self.config.heuristic_limit(self.mean_degree);
        for v in queued {
            let p = finder.priority(self.graph, v, limit);
            rekey(&mut self.queue, v, p)?;
        }
        Ok(())
    }
}

/// Contract `graph` with `config`, no progress reporting
pub fn prepare<D: DataAccess>(graph: &mut GraphStorage<D>, config: &ContractionConfig) -> Result<ContractionStats> {
    Preparation::new(graph, config.clone())?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::query::ChQuery;
    use crate::storage::EdgeFlags;

    fn line(n: u32) -> GraphStorage {
        let mut g = GraphStorage::new();
        for i in 0..n - 1 {
            g.add_edge(i, i + 1, 1, EdgeFlags::both()).unwrap();
        }
        g
    }

    #[test]
    fn test_empty_graph_is_noop() {
        let mut g = GraphStorage::new();
        let stats = prepare(&mut g, &ContractionConfig::default()).unwrap();
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.shortcuts_added, 0);
        assert!(g.is_contracted());
    }

    #[test]
    fn test_single_node_gets_level_one() {
        let mut g = GraphStorage::new();
        g.ensure_node(0).unwrap();
        let stats = prepare(&mut g, &ContractionConfig::default()).unwrap();
        assert_eq!(g.level(0), 1);
        assert_eq!(stats.shortcuts_added, 0);
        assert_eq!(stats.max_level, 1);
    }

    #[test]
    fn test_levels_are_distinct_and_positive() {
        let mut g = line(12);
        g.add_edge(0, 6, 9, EdgeFlags::forward()).unwrap();
        g.add_edge(11, 3, 4, EdgeFlags::forward()).unwrap();
        prepare(&mut g, &ContractionConfig::default()).unwrap();

        let mut levels: Vec<u32> = (0..12).map(|v| g.level(v)).collect();
        levels.sort_unstable();
        assert_eq!(levels, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_shortcut_weights_equal_skipped_sum() {
        let mut g = line(8);
        g.add_edge(2, 5, 2, EdgeFlags::both()).unwrap();
        prepare(&mut g, &ContractionConfig::default()).unwrap();

        for e in g.all_edges().filter(|e| e.is_shortcut()) {
            let (s1, s2) = e.skipped.unwrap();
            let (a1, b1) = g.endpoints(s1);
            let (a2, b2) = g.endpoints(s2);
            let w1 = g.edge(s1, b1).unwrap().weight;
            let w2 = g.edge(s2, b2).unwrap().weight;
            assert_eq!(e.weight, w1 + w2, "shortcut {}", e.edge);
            // the two skipped edges share the bypassed node
            assert!(a1 == a2 || a1 == b2 || b1 == a2 || b1 == b2);
            let o1 = g.edge(s1, b1).unwrap().original_edges;
            let o2 = g.edge(s2, b2).unwrap().original_edges;
            assert_eq!(e.original_edges, o1 + o2);
        }
    }

    #[test]
    fn test_contract_twice_fails() {
        let mut g = line(3);
        prepare(&mut g, &ContractionConfig::default()).unwrap();
        assert!(matches!(
            prepare(&mut g, &ContractionConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_weighting_applied_once() {
        let mut g = GraphStorage::new();
        g.add_edge(0, 1, 1_000_000, EdgeFlags::both().with_speed(36)).unwrap();
        apply_weighting(&mut g, Weighting::Fastest, 50).unwrap();
        assert_eq!(g.edge(0, 1).unwrap().weight, 100_000);
        assert!(apply_weighting(&mut g, Weighting::Fastest, 50).is_err());
    }

    #[test]
    fn test_shortcut_reinsertion_is_idempotent() {
        let mut g = line(3);
        let sc = Shortcut {
            from: 0,
            to: 2,
            weight: 2,
            flags: EdgeFlags::both(),
            skipped: (0, 1),
            original_edges: 2,
        };
        let first = insert_or_update_shortcut(&mut g, &sc).unwrap();
        let ShortcutInsert::Added(edge) = first else {
            panic!("expected a new shortcut, got {first:?}");
        };
        assert_eq!(insert_or_update_shortcut(&mut g, &sc).unwrap(), ShortcutInsert::Unchanged(edge));
        assert_eq!(g.shortcut_count(), 1);
    }

    #[test]
    fn test_shortcut_decreased_in_place() {
        let mut g = line(3);
        g.add_edge(0, 1, 1, EdgeFlags::both()).unwrap();
        let mut sc = Shortcut {
            from: 0,
            to: 2,
            weight: 5,
            flags: EdgeFlags::forward(),
            skipped: (0, 1),
            original_edges: 2,
        };
        let ShortcutInsert::Added(edge) = insert_or_update_shortcut(&mut g, &sc).unwrap() else {
            panic!("expected a new shortcut");
        };
        sc.weight = 2;
        sc.skipped = (2, 1);
        assert_eq!(insert_or_update_shortcut(&mut g, &sc).unwrap(), ShortcutInsert::Updated(edge));
        let view = g.edge(edge, 2).unwrap();
        assert_eq!(view.weight, 2);
        assert_eq!(view.skipped, Some((2, 1)));

        // other direction is a different shortcut
        sc.flags = EdgeFlags::backward();
        assert!(matches!(insert_or_update_shortcut(&mut g, &sc).unwrap(), ShortcutInsert::Added(_)));
        assert_eq!(g.shortcut_count(), 2);
    }

    #[test]
    fn test_lazy_updates_reinsert_and_keep_queries_exact() {
        // every node starts at priority 0; contracting an end node raises its
        // neighbor to 1, which the lazy check must push back
        let mut g = line(5);
        let config = ContractionConfig {
            edge_difference_weight: 0,
            original_edges_weight: 0,
            contracted_neighbors_weight: 1,
            neighbor_updates_percentage: 0,
            periodic_updates_percentage: 0,
            last_lazy_nodes_updates_percentage: 100,
            weighting: Weighting::Shortest,
            ..ContractionConfig::default()
        };
        let stats = prepare(&mut g, &config).unwrap();
        assert!(stats.lazy_reinserts > 0);
        assert_eq!(stats.neighbor_updates, 0);

        let mut query = ChQuery::new(&g);
        let path = query.route(0, 4).unwrap().unwrap();
        assert_eq!(path.weight, 4);
        let hops: Vec<(NodeId, NodeId)> = path.edges.iter().map(|e| (e.from, e.to)).collect();
        assert_eq!(hops, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn test_lazy_updates_disabled() {
        let mut g = line(5);
        let config = ContractionConfig {
            edge_difference_weight: 0,
            original_edges_weight: 0,
            contracted_neighbors_weight: 1,
            neighbor_updates_percentage: 0,
            periodic_updates_percentage: 0,
            last_lazy_nodes_updates_percentage: 0,
            ..ContractionConfig::default()
        };
        let stats = prepare(&mut g, &config).unwrap();
        assert_eq!(stats.lazy_reinserts, 0);
        assert_eq!(stats.max_level, 5);
    }

    #[test]
    fn test_rekey_missing_node_is_queue_inconsistency() {
        let mut queue: PriorityQueue<NodeId, Reverse<(i64, NodeId)>> = PriorityQueue::new();
        assert!(matches!(rekey(&mut queue, 7, 0), Err(Error::QueueInconsistency(_))));

        queue.push(7, Reverse((3, 7)));
        rekey(&mut queue, 7, -1).unwrap();
        assert_eq!(queue.peek(), Some((&7, &Reverse((-1, 7)))));
    }

    #[test]
    fn test_spokes_longer_than_u32_weights() {
        // 2,500 km spokes: any path through the hub exceeds u32::MAX
        let mut g = GraphStorage::new();
        for leaf in 1..=4 {
            g.add_edge(0, leaf, 2_500_000_000, EdgeFlags::both()).unwrap();
        }
        let config = ContractionConfig {
            edge_difference_weight: 0,
            original_edges_weight: 0,
            contracted_neighbors_weight: 0,
            weighting: Weighting::Shortest,
            ..ContractionConfig::default()
        };
        prepare(&mut g, &config).unwrap();

        let mut query = ChQuery::new(&g);
        assert_eq!(query.weight(1, 2).unwrap(), Some(5_000_000_000));
        let route = query.route(3, 4).unwrap().unwrap();
        assert_eq!(route.weight, 5_000_000_000);
        assert_eq!(route.nodes, vec![3, 0, 4]);
    }

    #[test]
    fn test_progress_callback_reaches_total() {
        let mut g = line(20);
        let mut last = None;
        Preparation::new(&mut g, ContractionConfig::default())
            .unwrap()
            .run_with_progress(|p| last = Some(p))
            .unwrap();
        let last = last.unwrap();
        assert_eq!(last.contracted, 20);
        assert_eq!(last.remaining, 0);
    }
}
