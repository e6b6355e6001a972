//! Contraction and query parameters

use butterfly_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::weighting::Weighting;

/// Contraction preparation parameters, loadable from TOML.
///
/// ```toml
/// edge_difference_weight = 2
/// original_edges_weight = 4
/// contracted_neighbors_weight = 1
/// max_poll_factor_heuristic = 5.0
/// max_poll_factor_contraction = 200.0
/// periodic_updates_percentage = 10
/// last_lazy_nodes_updates_percentage = 100
/// neighbor_updates_percentage = 100
/// log_messages_percentage = 20
/// weighting = "fastest"
/// default_speed_kmh = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractionConfig {
    /// Coefficient of `shortcuts - degree`
    pub edge_difference_weight: i64,
    /// Coefficient of the summed original edge counts of the shortcuts
    pub original_edges_weight: i64,
    /// Coefficient of the contracted-neighbor counter
    pub contracted_neighbors_weight: i64,
    /// Witness budget while computing priorities, in multiples of the mean degree. 0 = unlimited
    pub max_poll_factor_heuristic: f64,
    /// Witness budget while contracting, in multiples of the mean degree. 0 = unlimited
    pub max_poll_factor_contraction: f64,
    /// Recompute every priority after this share of nodes, 0 disables
    pub periodic_updates_percentage: u32,
    /// Lazy updates run once fewer than this share of nodes is left in the queue
    pub last_lazy_nodes_updates_percentage: u32,
    /// Chance in percent that a neighbor is re-keyed after a contraction
    pub neighbor_updates_percentage: u32,
    /// Log progress after this share of nodes, 0 disables
    pub log_messages_percentage: u32,
    pub weighting: Weighting,
    /// Speed for `fastest` when the edge flags carry none
    pub default_speed_kmh: u32,
}

impl Default for ContractionConfig {
    fn default() -> Self {
        Self {
            edge_difference_weight: 2,
            original_edges_weight: 4,
            contracted_neighbors_weight: 1,
            max_poll_factor_heuristic: 5.0,
            max_poll_factor_contraction: 200.0,
            periodic_updates_percentage: 10,
            last_lazy_nodes_updates_percentage: 100,
            neighbor_updates_percentage: 100,
            log_messages_percentage: 20,
            weighting: Weighting::Shortest,
            default_speed_kmh: 50,
        }
    }
}

fn check_percentage(name: &str, value: u32) -> Result<()> {
    if value > 100 {
        return Err(Error::InvalidInput(format!(
            "{name} must be within 0..=100, got {value}"
        )));
    }
    Ok(())
}

fn settled_limit(factor: f64, mean_degree: f64) -> Option<usize> {
    (factor > 0.0).then(|| ((mean_degree * factor) as usize).max(1))
}

impl ContractionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| Error::InvalidInput(format!("invalid contraction config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        check_percentage("periodic_updates_percentage", self.periodic_updates_percentage)?;
        check_percentage(
            "last_lazy_nodes_updates_percentage",
            self.last_lazy_nodes_updates_percentage,
        )?;
        check_percentage("neighbor_updates_percentage", self.neighbor_updates_percentage)?;
        check_percentage("log_messages_percentage", self.log_messages_percentage)?;
        for (name, factor) in [
            ("max_poll_factor_heuristic", self.max_poll_factor_heuristic),
            ("max_poll_factor_contraction", self.max_poll_factor_contraction),
        ] {
            if !factor.is_finite() || factor < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{name} must be a non-negative number, got {factor}"
                )));
            }
        }
        if self.default_speed_kmh == 0 || self.default_speed_kmh > 255 {
            return Err(Error::InvalidInput(format!(
                "default_speed_kmh must be within 1..=255, got {}",
                self.default_speed_kmh
            )));
        }
        Ok(())
    }

    /// Witness budget for priority computation, `None` = unlimited
    pub fn heuristic_limit(&self, mean_degree: f64) -> Option<usize> {
        settled_limit(self.max_poll_factor_heuristic, mean_degree)
    }

    /// Witness budget for contraction, `None` = unlimited
    pub fn contraction_limit(&self, mean_degree: f64) -> Option<usize> {
        settled_limit(self.max_poll_factor_contraction, mean_degree)
    }
}

/// Query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Settled nodes (both directions) before giving up, `None` = unlimited
    pub max_settled_nodes: Option<usize>,
}
