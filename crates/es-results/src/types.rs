//! Result data types.

use serde::{Deserialize, Serialize};

/// Which of the two persistent grids a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    TotalSiteEnergy,
    SiteEnergyPerArea,
}

impl MetricKind {
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::TotalSiteEnergy => "total site energy",
            MetricKind::SiteEnergyPerArea => "site energy per total building area",
        }
    }
}

/// What a `write_metric` call did. Coordinates are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Skipped,
    Written { row: usize, column: usize },
}
