//! CLI commands for butterfly-ch

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use crate::ch::{apply_weighting, ChQuery, ContractionConfig, Preparation, QueryConfig};
use crate::formats::GraphFile;
use crate::ingest;
use crate::validate::validate_random_queries;
use crate::weighting::Weighting;

#[derive(Parser)]
#[command(name = "butterfly-ch")]
#[command(about = "Contraction Hierarchies routing core", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a JSON edge list and write a graph file
    Build {
        /// Input JSON graph
        #[arg(short, long)]
        input: PathBuf,

        /// Output graph file (.bch)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Contract a graph file into a contraction hierarchy
    Contract {
        /// Input graph file from `build`
        #[arg(short, long)]
        graph: PathBuf,

        /// Output contracted graph file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        tuning: ContractionArgs,

        /// Print contraction statistics as JSON
        #[arg(long)]
        json_stats: bool,
    },

    /// Find the shortest route between two nodes of a contracted graph
    Route {
        /// Contracted graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Source node id
        #[arg(long)]
        from: u32,

        /// Target node id
        #[arg(long)]
        to: u32,

        /// Give up after this many settled nodes
        #[arg(long)]
        max_settled: Option<usize>,
    },

    /// Compare random CH queries against Dijkstra
    Validate {
        /// Contracted graph file
        #[arg(long)]
        ch: PathBuf,

        /// Uncontracted graph file (defaults to the base edges of the contracted graph)
        #[arg(long)]
        base: Option<PathBuf>,

        /// Number of random queries
        #[arg(short = 'n', long, default_value = "1000")]
        queries: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Default speed used to weight an unweighted base graph
        #[arg(long, default_value = "50")]
        default_speed: u32,
    },

    /// Show the header of a graph file
    Info {
        /// Graph file
        #[arg(short, long)]
        graph: PathBuf,
    },
}

/// Contraction parameters; each flag overrides the config file
#[derive(Args, Debug, Default)]
pub struct ContractionArgs {
    /// TOML file with contraction parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Weighting: shortest or fastest
    #[arg(long)]
    weighting: Option<Weighting>,

    /// Witness budget while ranking nodes, times the mean degree (0 = unlimited)
    #[arg(long)]
    max_poll_heuristic: Option<f64>,

    /// Witness budget while contracting, times the mean degree (0 = unlimited)
    #[arg(long)]
    max_poll_contraction: Option<f64>,

    /// Recompute all priorities after this percentage of nodes (0 disables)
    #[arg(long)]
    periodic_updates: Option<u32>,

    /// Lazy updates once this percentage of nodes is left (0 disables)
    #[arg(long)]
    lazy_updates: Option<u32>,

    /// Percentage of neighbors whose priority is recomputed after a contraction
    #[arg(long)]
    neighbor_updates: Option<u32>,

    /// Log progress after this percentage of nodes (0 disables)
    #[arg(long)]
    log_messages: Option<u32>,

    /// Priority coefficient of the edge difference
    #[arg(long)]
    edge_difference_weight: Option<i64>,

    /// Priority coefficient of the original edge count
    #[arg(long)]
    original_edges_weight: Option<i64>,

    /// Priority coefficient of the contracted neighbors
    #[arg(long)]
    contracted_neighbors_weight: Option<i64>,
}

impl ContractionArgs {
    /// Config file (or defaults) with the command line overrides applied
    fn into_config(self) -> Result<ContractionConfig> {
        let mut cfg = match &self.config {
            Some(path) => ContractionConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ContractionConfig::default(),
        };
        if let Some(v) = self.weighting {
            cfg.weighting = v;
        }
        if let Some(v) = self.max_poll_heuristic {
            cfg.max_poll_factor_heuristic = v;
        }
        if let Some(v) = self.max_poll_contraction {
            cfg.max_poll_factor_contraction = v;
        }
        if let Some(v) = self.periodic_updates {
            cfg.periodic_updates_percentage = v;
        }
        if let Some(v) = self.lazy_updates {
            cfg.last_lazy_nodes_updates_percentage = v;
        }
        if let Some(v) = self.neighbor_updates {
            cfg.neighbor_updates_percentage = v;
        }
        if let Some(v) = self.log_messages {
            cfg.log_messages_percentage = v;
        }
        if let Some(v) = self.edge_difference_weight {
            cfg.edge_difference_weight = v;
        }
        if let Some(v) = self.original_edges_weight {
            cfg.original_edges_weight = v;
        }
        if let Some(v) = self.contracted_neighbors_weight {
            cfg.contracted_neighbors_weight = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Build { input, output } => {
                println!("🦋 Building graph");
                println!("📂 Input: {}", input.display());
                let start = Instant::now();
                let (graph, stats) = ingest::load_file(&input)?;
                println!("  ✓ {} nodes, {} edges", stats.nodes, stats.edges);
                if stats.skipped_self_loops + stats.skipped_closed > 0 {
                    println!(
                        "  ✓ Skipped {} self-loops, {} closed edges",
                        stats.skipped_self_loops, stats.skipped_closed
                    );
                }
                GraphFile::write(&output, &graph)?;
                println!("  ✓ Wrote {} in {:.2?}", output.display(), start.elapsed());
                Ok(())
            }
            Commands::Contract {
                graph,
                output,
                tuning,
                json_stats,
            } => {
                let cfg = tuning.into_config()?;

                println!("🦋 Contracting {}", graph.display());
                let mut g = GraphFile::read(&graph)?;
                println!("  ✓ Loaded {} nodes, {} edges", g.node_count(), g.edge_count());

                let stats = Preparation::new(&mut g, cfg)?.run()?;
                GraphFile::write(&output, &g)?;

                if json_stats {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    stats.print();
                }
                println!("\n✅ Wrote {}", output.display());
                Ok(())
            }
            Commands::Route {
                graph,
                from,
                to,
                max_settled,
            } => {
                let g = GraphFile::read(&graph)?;
                if !g.is_contracted() {
                    anyhow::bail!("{} is not contracted; run `contract` first", graph.display());
                }
                let mut query = ChQuery::with_config(
                    &g,
                    QueryConfig {
                        max_settled_nodes: max_settled,
                    },
                );
                let start = Instant::now();
                let route = query.route(from, to)?;
                let elapsed = start.elapsed();
                match route {
                    Some(route) => {
                        println!("{}", serde_json::to_string_pretty(&route)?);
                        tracing::info!(from, to, weight = route.weight, edges = route.edges.len(), ?elapsed, "route found");
                    }
                    None => {
                        println!("null");
                        tracing::info!(from, to, ?elapsed, "no route");
                    }
                }
                Ok(())
            }
            Commands::Validate {
                ch,
                base,
                queries,
                seed,
                default_speed,
            } => {
                let ch_graph = GraphFile::read(&ch)?;
                if !ch_graph.is_contracted() {
                    anyhow::bail!("{} is not contracted", ch.display());
                }
                let result = match base {
                    Some(base) => {
                        let mut base_graph = GraphFile::read(&base)?;
                        if let (None, Some(w)) = (base_graph.weighting(), ch_graph.weighting()) {
                            apply_weighting(&mut base_graph, w, default_speed)?;
                        }
                        if base_graph.weighting() != ch_graph.weighting() {
                            anyhow::bail!("Base and contracted graph use different weightings");
                        }
                        validate_random_queries(&base_graph, &ch_graph, queries, seed)?
                    }
                    None => validate_random_queries(&ch_graph, &ch_graph, queries, seed)?,
                };
                result.print();
                if !result.is_valid() {
                    anyhow::bail!("{} of {} queries disagree with Dijkstra", result.incorrect, result.n_tests);
                }
                Ok(())
            }
            Commands::Info { graph } => {
                let header = GraphFile::read_header(&graph)?;
                println!("📋 {}", graph.display());
                println!("  Version:     {}", header.version);
                println!("  Contracted:  {}", header.contracted);
                println!(
                    "  Weighting:   {}",
                    header.weighting.map_or("none (distances)".to_string(), |w| w.to_string())
                );
                println!("  Nodes:       {}", header.node_count);
                println!("  Edges:       {} ({} shortcuts)", header.edge_count, header.shortcut_count);
                match header.bbox.degrees() {
                    Some((min_lat, min_lon, max_lat, max_lon)) => println!(
                        "  BBox:        {:.6},{:.6} → {:.6},{:.6}",
                        min_lat, min_lon, max_lat, max_lon
                    ),
                    None => println!("  BBox:        (no coordinates)"),
                }
                if let Some(created) = header.created_at() {
                    println!("  Created:     {}", created.to_rfc3339());
                }
                Ok(())
            }
        }
    }
}
