//! Edge weighting: turns a stored distance into a routing weight

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::storage::graph::MAX_WEIGHT;
use crate::storage::EdgeFlags;

/// How base-edge distances (millimeters) become routing weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Weight is the distance itself
    #[default]
    Shortest,
    /// Weight is the travel time in milliseconds at the edge speed
    Fastest,
}

impl Weighting {
    /// Compute the weight of a base edge.
    ///
    /// `Fastest` uses the speed bits of `flags`, falling back to `default_speed_kmh`
    /// when they are unset.
    pub fn weight(self, distance_mm: u64, flags: EdgeFlags, default_speed_kmh: u32) -> u64 {
        let weight = match self {
            Weighting::Shortest => distance_mm,
            Weighting::Fastest => {
                let speed = match flags.speed_kmh() {
                    0 => default_speed_kmh.max(1),
                    s => s,
                } as u64;
                // mm / (km/h) → ms: mm * 3600 / (speed * 1000)
                distance_mm.saturating_mul(36).saturating_add(speed * 5) / (speed * 10)
            }
        };
        weight.min(MAX_WEIGHT)
    }

    pub(crate) fn code(self) -> u16 {
        match self {
            Weighting::Shortest => 1,
            Weighting::Fastest => 2,
        }
    }

    pub(crate) fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Weighting::Shortest),
            2 => Some(Weighting::Fastest),
            _ => None,
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Shortest => write!(f, "shortest"),
            Weighting::Fastest => write!(f, "fastest"),
        }
    }
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shortest" => Ok(Weighting::Shortest),
            "fastest" => Ok(Weighting::Fastest),
            other => Err(format!("unknown weighting: {other} (expected shortest or fastest)")),
        }
    }
}
