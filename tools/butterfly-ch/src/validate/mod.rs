//! CH correctness validation against plain Dijkstra
//!
//! Random source/target pairs (seeded `StdRng`) are answered by the CH query on the contracted
//! graph and by Dijkstra on the base graph. Pairs are split across rayon workers, each owning
//! its query state. Query latencies go into an HDR histogram.

use anyhow::Result;
use hdrhistogram::Histogram;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;

use crate::ch::{ChQuery, Dijkstra, QueryConfig};
use crate::storage::{DataAccess, GraphStorage, NodeId};

#[derive(Debug)]
pub struct ValidationError {
    pub source: NodeId,
    pub target: NodeId,
    pub dijkstra_weight: Option<u64>,
    pub ch_weight: Option<u64>,
    pub detail: Option<String>,
}

#[derive(Debug)]
pub struct ValidationResult {
    pub n_tests: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unreachable_both: usize,
    pub errors: Vec<ValidationError>,
    pub latency_p50_us: u64,
    pub latency_p99_us: u64,
    pub latency_max_us: u64,
}

impl ValidationResult {
    pub fn print(&self) {
        let pct = |n: usize| n as f64 * 100.0 / self.n_tests.max(1) as f64;
        println!("\n=== VALIDATION RESULTS ===");
        println!("  Total tests:     {}", self.n_tests);
        println!("  Correct:         {} ({:.2}%)", self.correct, pct(self.correct));
        println!("  Incorrect:       {} ({:.2}%)", self.incorrect, pct(self.incorrect));
        println!("  Unreachable:     {}", self.unreachable_both);
        println!(
            "  CH query latency: p50 {} µs, p99 {} µs, max {} µs",
            self.latency_p50_us, self.latency_p99_us, self.latency_max_us
        );

        if !self.errors.is_empty() {
            println!("\n  Sample errors:");
            for err in &self.errors {
                println!(
                    "    {} → {}: Dijkstra={:?}, CH={:?}{}",
                    err.source,
                    err.target,
                    err.dijkstra_weight,
                    err.ch_weight,
                    err.detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
                );
            }
        }

        if self.incorrect == 0 {
            println!("\n  ✅ ALL TESTS PASSED!");
        } else {
            println!("\n  ❌ VALIDATION FAILED!");
        }
    }

    pub fn is_valid(&self) -> bool {
        self.incorrect == 0
    }
}

enum Outcome {
    Correct { unreachable: bool },
    Incorrect(ValidationError),
}

const MAX_REPORTED_ERRORS: usize = 10;

fn check_pair<B: DataAccess, C: DataAccess>(
    dijkstra: &mut Dijkstra<'_, B>,
    query: &mut ChQuery<'_, C>,
    source: NodeId,
    target: NodeId,
) -> Result<(Outcome, u64)> {
    let expected = dijkstra.route(source, target)?.map(|r| r.weight);

    let start = Instant::now();
    let route = query.route(source, target)?;
    let micros = start.elapsed().as_micros() as u64;

    let actual = route.as_ref().map(|r| r.weight);
    let mismatch = |detail: Option<String>| {
        Outcome::Incorrect(ValidationError {
            source,
            target,
            dijkstra_weight: expected,
            ch_weight: actual,
            detail,
        })
    };

    let outcome = match (&route, expected) {
        (None, None) => Outcome::Correct { unreachable: true },
        (Some(r), Some(w)) if r.weight == w => {
            if r.edge_weight_sum() != r.weight {
                mismatch(Some(format!("unpacked edges sum to {}", r.edge_weight_sum())))
            } else if !r.is_chained() {
                mismatch(Some("unpacked edges do not chain".to_string()))
            } else {
                Outcome::Correct { unreachable: false }
            }
        }
        _ => mismatch(None),
    };
    Ok((outcome, micros))
}

/// Compare `n_tests` random CH queries on `ch` with Dijkstra on `base`
pub fn validate_random_queries<B: DataAccess, C: DataAccess>(
    base: &GraphStorage<B>,
    ch: &GraphStorage<C>,
    n_tests: usize,
    seed: u64,
) -> Result<ValidationResult> {
    if base.node_count() != ch.node_count() {
        anyhow::bail!(
            "Base graph has {} nodes, contracted graph {}",
            base.node_count(),
            ch.node_count()
        );
    }
    let n_nodes = base.node_count();
    if n_nodes == 0 {
        anyhow::bail!("Cannot validate an empty graph");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let pairs: Vec<(NodeId, NodeId)> = (0..n_tests)
        .map(|_| (rng.random_range(0..n_nodes), rng.random_range(0..n_nodes)))
        .collect();

    println!("Validating {} random queries...", n_tests);

    let outcomes: Vec<Result<(Outcome, u64)>> = pairs
        .par_iter()
        .map_init(
            || (Dijkstra::new(base), ChQuery::with_config(ch, QueryConfig::default())),
            |(dijkstra, query), &(s, t)| check_pair(dijkstra, query, s, t),
        )
        .collect();

    let mut histogram = Histogram::<u64>::new(3)?;
    let mut result = ValidationResult {
        n_tests,
        correct: 0,
        incorrect: 0,
        unreachable_both: 0,
        errors: Vec::new(),
        latency_p50_us: 0,
        latency_p99_us: 0,
        latency_max_us: 0,
    };

    for outcome in outcomes {
        let (outcome, micros) = outcome?;
        histogram.record(micros)?;
        match outcome {
            Outcome::Correct { unreachable } => {
                result.correct += 1;
                if unreachable {
                    result.unreachable_both += 1;
                }
            }
            Outcome::Incorrect(err) => {
                result.incorrect += 1;
                if result.errors.len() < MAX_REPORTED_ERRORS {
                    result.errors.push(err);
                }
            }
        }
    }

    result.latency_p50_us = histogram.value_at_quantile(0.50);
    result.latency_p99_us = histogram.value_at_quantile(0.99);
    result.latency_max_us = histogram.max();
    Ok(result)
}
