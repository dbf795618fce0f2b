//! Error types for the es-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// provides one error interface for both CLI and server.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Parse(#[from] es_core::ParseError),

    #[error("No weather artifact for {simulation} ({scenario}, {year})")]
    UnmatchedWeather {
        simulation: String,
        scenario: String,
        year: i32,
    },

    #[error(transparent)]
    Engine(#[from] es_engine::EngineError),

    #[error("Failed to extract metrics for {simulation}; ensure annual summary tables are produced")]
    NoMetricExtracted { simulation: String },

    #[error("Results error: {0}")]
    Results(#[from] es_results::ResultsError),

    #[error("Storage error: {0}")]
    Storage(#[from] es_storage::StorageError),

    #[error("No weather artifacts under {bucket}/{prefix}")]
    NoWeatherArtifacts { bucket: String, prefix: String },

    #[error("No simulation artifacts under {bucket}/{prefix}")]
    NoSimulationArtifacts { bucket: String, prefix: String },

    #[error("Duplicate weather artifacts for ({scenario}, {year}): {first} and {second}")]
    DuplicateWeather {
        scenario: String,
        year: i32,
        first: String,
        second: String,
    },

    #[error("Run {0} does not exist")]
    RunNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config file: {}", path.display())]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for es-app operations.
pub type AppResult<T> = Result<T, AppError>;
