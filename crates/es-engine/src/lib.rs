//! es-engine: external simulation engine supervision and result extraction.
//!
//! - runner: launches the engine per (simulation, weather) pair with a timeout
//! - extract: pulls the two site-energy metrics out of whatever report files
//!   the engine left behind

pub mod error;
pub mod extract;
pub mod runner;

pub use error::{EngineError, EngineResult};
pub use extract::{
    DelimitedStrategy, ExtractedMetrics, MetricExtractor, MetricStrategy, SourceFormat,
    StructuredStrategy,
};
pub use runner::{EnergyPlusEngine, SimulationEngine};
