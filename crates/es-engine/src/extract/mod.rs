//! Metric extraction from engine output.
//!
//! The engine's report layout is not stable across versions, so extraction
//! is an ordered chain of strategies: the SQLite result file first, then the
//! tab-delimited report, then the comma-delimited one. The first strategy that
//! yields at least one value wins; later ones are not attempted.

mod delimited;
mod structured;

pub use delimited::DelimitedStrategy;
pub use structured::StructuredStrategy;

use serde::Serialize;
use std::path::Path;

/// Table-name prefix shared by every strategy.
pub(crate) const TABLE_PHRASE: &str = "site and source energy";
/// Row holding both metrics.
pub(crate) const ROW_PHRASE: &str = "total site energy";
/// Column prefix of the total metric.
pub(crate) const TOTAL_COLUMN_PHRASE: &str = "total energy";
/// Column prefix of the per-area metric.
pub(crate) const PER_AREA_COLUMN_PHRASE: &str = "energy per total building area";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Structured,
    Tab,
    Csv,
    None,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Structured => "sql",
            SourceFormat::Tab => "tab",
            SourceFormat::Csv => "csv",
            SourceFormat::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedMetrics {
    pub total: Option<f64>,
    pub per_area: Option<f64>,
    pub source: SourceFormat,
}

impl ExtractedMetrics {
    pub fn none() -> Self {
        Self {
            total: None,
            per_area: None,
            source: SourceFormat::None,
        }
    }

    pub fn has_any(&self) -> bool {
        self.total.is_some() || self.per_area.is_some()
    }
}

/// One way of reading the metrics out of an output directory.
///
/// Missing files, missing markers and unparseable numbers are all "no
/// result", never errors.
pub trait MetricStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_extract(&self, output_dir: &Path) -> Option<ExtractedMetrics>;
}

pub struct MetricExtractor {
    strategies: Vec<Box<dyn MetricStrategy>>,
}

impl MetricExtractor {
    pub fn new(strategies: Vec<Box<dyn MetricStrategy>>) -> Self {
        Self { strategies }
    }

    /// `eplusout.sql`, then `eplustbl.tab`, then `eplustbl.csv`.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(StructuredStrategy::default()),
            Box::new(DelimitedStrategy::tab()),
            Box::new(DelimitedStrategy::csv()),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, output_dir: &Path) -> ExtractedMetrics {
        for strategy in &self.strategies {
            match strategy.try_extract(output_dir) {
                Some(metrics) if metrics.has_any() => return metrics,
                _ => tracing::debug!(strategy = strategy.name(), "no metrics from strategy"),
            }
        }
        ExtractedMetrics::none()
    }
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::standard()
    }
}

/// Strip thousands separators and whitespace; anything else unparseable is `None`.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_strips_separators() {
        assert_eq!(parse_number(" 125,000.50 "), Some(125000.5));
        assert_eq!(parse_number("42.3"), Some(42.3));
        assert_eq!(parse_number("1 234"), Some(1234.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    struct Fixed(Option<ExtractedMetrics>);

    impl MetricStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn try_extract(&self, _output_dir: &Path) -> Option<ExtractedMetrics> {
            self.0
        }
    }

    #[test]
    fn first_non_empty_strategy_wins() {
        let empty = ExtractedMetrics {
            total: None,
            per_area: None,
            source: SourceFormat::Structured,
        };
        let tab = ExtractedMetrics {
            total: None,
            per_area: Some(1.0),
            source: SourceFormat::Tab,
        };
        let csv = ExtractedMetrics {
            total: Some(2.0),
            per_area: Some(3.0),
            source: SourceFormat::Csv,
        };
        let extractor = MetricExtractor::new(vec![
            Box::new(Fixed(Some(empty))),
            Box::new(Fixed(None)),
            Box::new(Fixed(Some(tab))),
            Box::new(Fixed(Some(csv))),
        ]);
        assert_eq!(extractor.extract(Path::new(".")), tab);
    }

    #[test]
    fn exhausted_chain_reports_none() {
        let extractor = MetricExtractor::new(vec![Box::new(Fixed(None))]);
        let metrics = extractor.extract(Path::new("."));
        assert_eq!(metrics, ExtractedMetrics::none());
        assert!(!metrics.has_any());
    }
}
