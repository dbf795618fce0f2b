//! es-results: persistent year × scenario result matrices.

pub mod matrix;
pub mod store;
pub mod types;

pub use matrix::{Cell, ResultMatrix};
pub use store::MatrixStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("Year {year} outside [{start}, {end}]")]
    YearOutOfRange { year: i32, start: i32, end: i32 },

    #[error("Storage error: {0}")]
    Storage(#[from] es_storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed result matrix: {message}")]
    MalformedMatrix { message: String },
}
