use async_trait::async_trait;
use es_core::{AgingCode, ScenarioKey};
use es_results::{MatrixStore, ResultMatrix, ResultsError, WriteOutcome};
use es_storage::{ListPage, MemoryObjectStore, ObjectStore, StorageResult};
use std::sync::Arc;
use std::time::Duration;

const BUCKET: &str = "mmstore";
const TOTAL: &str = "results_total_site_energy.json";

fn aging(text: &str) -> AgingCode {
    text.parse().unwrap()
}

#[tokio::test]
async fn absent_value_never_touches_storage() {
    let backing = Arc::new(MemoryObjectStore::new());
    let store = MatrixStore::new(backing.clone());

    let outcome = store
        .write_metric(BUCKET, TOTAL, ScenarioKey::Rcp85, aging("E12"), 2030, None)
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Skipped);
    assert_eq!(backing.put_count(), 0);
    assert!(backing.object(BUCKET, TOTAL).is_none());
}

#[tokio::test]
async fn absent_value_leaves_existing_document_byte_identical() {
    let backing = Arc::new(MemoryObjectStore::new());
    let store = MatrixStore::new(backing.clone());
    store
        .write_metric(BUCKET, TOTAL, ScenarioKey::Rcp85, aging("E12"), 2030, Some(1.0))
        .await
        .unwrap();
    let before = backing.object(BUCKET, TOTAL).unwrap();

    store
        .write_metric(BUCKET, TOTAL, ScenarioKey::Rcp45, aging("T3"), 2031, None)
        .await
        .unwrap();

    assert_eq!(backing.object(BUCKET, TOTAL).unwrap(), before);
}

#[tokio::test]
async fn out_of_range_year_fails_without_mutation() {
    let backing = Arc::new(MemoryObjectStore::new());
    let store = MatrixStore::new(backing.clone());

    for year in [2020, 2024, 2085] {
        let err = store
            .write_metric(BUCKET, TOTAL, ScenarioKey::Rcp26, aging("F1"), year, Some(3.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ResultsError::YearOutOfRange { .. }));
    }
    assert_eq!(backing.put_count(), 0);
}

#[tokio::test]
async fn creates_then_updates_document() {
    let backing = Arc::new(MemoryObjectStore::new());
    let store = MatrixStore::new(backing.clone());

    let first = store
        .write_metric(BUCKET, TOTAL, ScenarioKey::Rcp85, aging("E12"), 2030, Some(125000.5))
        .await
        .unwrap();
    assert_eq!(first, WriteOutcome::Written { row: 8, column: 2 });

    let second = store
        .write_metric(BUCKET, TOTAL, ScenarioKey::Rcp85, aging("E12"), 2031, Some(9.0))
        .await
        .unwrap();
    assert_eq!(second, WriteOutcome::Written { row: 9, column: 2 });

    let matrix = ResultMatrix::from_slice(&backing.object(BUCKET, TOTAL).unwrap()).unwrap();
    assert_eq!(matrix.value_at(ScenarioKey::Rcp85, aging("E12"), 2030), Some(125000.5));
    assert_eq!(matrix.value_at(ScenarioKey::Rcp85, aging("E12"), 2031), Some(9.0));
    assert_eq!(matrix.columns().len(), 1);
}

/// Store whose reads take long enough for writers to interleave.
struct SlowStore(MemoryObjectStore);

#[async_trait]
impl ObjectStore for SlowStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StorageResult<ListPage> {
        self.0.list_page(bucket, prefix, continuation).await
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let body = self.0.get(bucket, key).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        body
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> StorageResult<()> {
        self.0.put(bucket, key, body).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_to_one_key_keep_every_cell() {
    let backing = Arc::new(SlowStore(MemoryObjectStore::new()));
    let store = MatrixStore::new(backing.clone());

    let mut handles = Vec::new();
    for level in 0..=AgingCode::MAX_LEVEL {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let code = AgingCode::new('E', level).unwrap();
            store
                .write_metric(BUCKET, TOTAL, ScenarioKey::Rcp45, code, 2040, Some(f64::from(level)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let matrix = store.load(BUCKET, TOTAL).await.unwrap();
    assert_eq!(matrix.columns().len(), usize::from(AgingCode::MAX_LEVEL) + 1);
    for level in 0..=AgingCode::MAX_LEVEL {
        let code = AgingCode::new('E', level).unwrap();
        assert_eq!(
            matrix.value_at(ScenarioKey::Rcp45, code, 2040),
            Some(f64::from(level))
        );
    }
}
