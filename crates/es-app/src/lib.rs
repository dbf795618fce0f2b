//! Shared application service layer for energy-sweep.
//!
//! This crate provides a unified interface for both the CLI and the HTTP
//! server, centralizing configuration, artifact indexing, batch execution
//! and run lifecycle management.

pub mod batch;
pub mod config;
pub mod error;
pub mod indexer;
pub mod progress;
pub mod run_service;

// Re-export key types for convenience
pub use batch::{
    ArtifactFailure, BatchCounts, BatchOrchestrator, BatchServices, BatchSummary, EngineFactory,
    energyplus_factory,
};
pub use config::{BatchConfig, DuplicateWeatherPolicy};
pub use error::{AppError, AppResult};
pub use indexer::{
    WeatherIndex, build_weather_index, index_weather_artifacts, list_simulation_artifacts,
};
pub use progress::{ArtifactProgress, BatchProgressEvent, BatchStage};
pub use run_service::{RunId, RunManager, RunRecord, RunState};
