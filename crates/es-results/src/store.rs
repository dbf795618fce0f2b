//! Read-modify-write persistence for result matrices.

use es_core::{AgingCode, ScenarioKey};
use es_storage::ObjectStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::matrix::ResultMatrix;
use crate::types::WriteOutcome;
use crate::ResultsResult;

type MatrixLocks = HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>;

/// Owns every load/modify/persist cycle on the matrices in a store.
///
/// Writers in this process that share a `MatrixStore` are serialized per
/// `(bucket, key)`, so concurrent runs cannot drop each other's cells.
/// Writers in other processes are not coordinated.
#[derive(Clone)]
pub struct MatrixStore {
    store: Arc<dyn ObjectStore>,
    locks: Arc<Mutex<MatrixLocks>>,
}

impl MatrixStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, bucket: &str, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry((bucket.to_string(), key.to_string()))
            .or_default()
            .clone()
    }

    /// Load a matrix, or a fresh one if the key does not exist yet.
    pub async fn load(&self, bucket: &str, key: &str) -> ResultsResult<ResultMatrix> {
        match self.store.get(bucket, key).await? {
            Some(bytes) => ResultMatrix::from_slice(&bytes),
            None => Ok(ResultMatrix::new()),
        }
    }

    /// Record `value` at (scenario, aging, year) in the matrix at `key`.
    ///
    /// An absent value is a no-op: nothing is read or written.
    pub async fn write_metric(
        &self,
        bucket: &str,
        key: &str,
        scenario: ScenarioKey,
        aging: AgingCode,
        year: i32,
        value: Option<f64>,
    ) -> ResultsResult<WriteOutcome> {
        let Some(value) = value else {
            return Ok(WriteOutcome::Skipped);
        };
        // Validate before any I/O so a bad year never rewrites the document.
        ResultMatrix::row_for_year(year)?;

        let lock = self.lock_for(bucket, key);
        let _guard = lock.lock().await;

        let mut matrix = self.load(bucket, key).await?;
        let (row, column) = matrix.set_value(scenario, aging, year, value)?;
        self.store.put(bucket, key, matrix.to_vec()?).await?;

        tracing::debug!(
            key,
            scenario = scenario.dotted(),
            aging = %aging,
            year,
            row,
            column,
            "matrix cell written"
        );
        Ok(WriteOutcome::Written { row, column })
    }
}
