mod common;

use common::*;
use es_app::{AppError, BatchConfig, BatchServices, RunManager, RunRecord, RunState};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

async fn finished(manager: &RunManager, id: &str) -> RunRecord {
    tokio::time::timeout(
        Duration::from_secs(10),
        manager.wait(id, Duration::from_millis(5)),
    )
    .await
    .expect("run did not finish")
    .unwrap()
}

fn manager_with(engine: Arc<FakeEngine>) -> RunManager {
    let store = seeded_store(&["RCP8.5_E12_2030.idf"], &["Locale_RCP85_2030.epw"]);
    RunManager::new(services(store, engine), BatchConfig::default())
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let manager = manager_with(Arc::new(FakeEngine::standard()));

    assert!(matches!(manager.get("run-missing"), Err(AppError::RunNotFound(_))));
    assert!(matches!(manager.start("run-missing"), Err(AppError::RunNotFound(_))));
    assert!(matches!(
        manager.initialise("run-missing", json!({})),
        Err(AppError::RunNotFound(_))
    ));
    assert!(manager.remove("run-missing").is_none());
}

#[tokio::test]
async fn run_lifecycle_to_success() {
    let gate = Arc::new(Semaphore::new(0));
    let engine = Arc::new(FakeEngine::standard().gated(gate.clone()));
    let manager = manager_with(engine.clone()).with_id_prefix("sweep");

    let id = manager.create_run();
    assert!(id.starts_with("sweep-"));
    assert_eq!(manager.get(&id).unwrap().state, RunState::Pending);

    let record = manager.initialise(&id, json!({"timeout_secs": 60})).unwrap();
    assert_eq!(record.state, RunState::Initialised);
    assert_eq!(record.config, json!({"timeout_secs": 60}));

    let record = manager.start(&id).unwrap();
    assert_eq!(record.state, RunState::Running);
    assert!(record.started_at.is_some());

    // Neither call disturbs a running batch.
    let again = manager.start(&id).unwrap();
    assert_eq!(again.state, RunState::Running);
    let reinit = manager.initialise(&id, json!({"bucket": "elsewhere"})).unwrap();
    assert_eq!(reinit.config, json!({"timeout_secs": 60}));

    gate.add_permits(1);
    let done = finished(&manager, &id).await;
    assert_eq!(done.state, RunState::Succeeded);
    let summary = done.result.unwrap();
    assert_eq!(summary.counts.success, 1);
    assert_eq!(summary.bucket, "mmstore");
    assert!(done.error.is_none());
    assert!(done.finished_at.is_some());
    assert_eq!(engine.calls().len(), 1);

    // Terminal states are absorbing.
    assert_eq!(manager.start(&id).unwrap().state, RunState::Succeeded);
    assert_eq!(
        manager.initialise(&id, json!({})).unwrap().state,
        RunState::Succeeded
    );
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn start_without_initialise_uses_base_config() {
    let manager = manager_with(Arc::new(FakeEngine::standard()));
    let id = manager.create_run();

    manager.start(&id).unwrap();
    let done = finished(&manager, &id).await;
    assert_eq!(done.state, RunState::Succeeded);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_initialise() {
    let manager = manager_with(Arc::new(FakeEngine::standard()));
    let id = manager.create_run();

    let err = manager
        .initialise(&id, json!({"timeout_secs": "forever"}))
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidConfig(_)));
    assert_eq!(manager.get(&id).unwrap().state, RunState::Pending);
}

#[tokio::test]
async fn batch_abort_sets_error_state() {
    let store = seeded_store(&["RCP8.5_E12_2030.idf"], &[]);
    let manager = RunManager::new(
        services(store, Arc::new(FakeEngine::standard())),
        BatchConfig::default(),
    );
    let id = manager.create_run();
    manager.initialise(&id, json!({})).unwrap();
    manager.start(&id).unwrap();

    let done = finished(&manager, &id).await;
    assert_eq!(done.state, RunState::Error);
    assert!(done.error.unwrap().contains("No weather artifacts"));
    assert!(done.result.is_none());
    assert_eq!(manager.start(&id).unwrap().state, RunState::Error);
}

#[tokio::test]
async fn config_overrides_stay_with_their_run() {
    let store = seeded_store(&["RCP8.5_E12_2030.idf"], &["Locale_RCP85_2030.epw"]);
    seed(&store, "other", &["RCP4.5_F2_2050.idf"], &["Locale_RCP45_2050.epw"]);
    let engine = Arc::new(FakeEngine::standard());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let services = BatchServices::new(store.clone(), recording_factory(engine, seen.clone()));
    let manager = RunManager::new(services, BatchConfig::default());

    let first = manager.create_run();
    let second = manager.create_run();
    manager
        .initialise(&first, json!({"bucket": "other", "timeout_secs": 5}))
        .unwrap();
    manager.initialise(&second, json!({})).unwrap();

    manager.start(&first).unwrap();
    manager.start(&second).unwrap();
    let first_done = finished(&manager, &first).await;
    let second_done = finished(&manager, &second).await;

    assert_eq!(first_done.result.unwrap().bucket, "other");
    assert_eq!(second_done.result.unwrap().bucket, "mmstore");
    assert!(store.object("other", TOTAL_KEY).is_some());
    assert!(store.object(BUCKET, TOTAL_KEY).is_some());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].bucket.as_str(), seen[0].timeout_secs), ("other", 5));
    assert_eq!((seen[1].bucket.as_str(), seen[1].timeout_secs), ("mmstore", 3600));
    assert_eq!(manager.base_config(), &BatchConfig::default());
}

#[tokio::test]
async fn removed_run_finishes_silently() {
    let gate = Arc::new(Semaphore::new(0));
    let engine = Arc::new(FakeEngine::standard().gated(gate.clone()));
    let manager = manager_with(engine.clone());

    let id = manager.create_run();
    manager.start(&id).unwrap();
    let removed = manager.remove(&id).unwrap();
    assert_eq!(removed.state, RunState::Running);

    gate.add_permits(1);
    for _ in 0..200 {
        if !engine.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(manager.get(&id), Err(AppError::RunNotFound(_))));
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn list_returns_every_run() {
    let manager = manager_with(Arc::new(FakeEngine::standard()));
    let a = manager.create_run();
    let b = manager.create_run();

    let mut ids: Vec<String> = manager.list().into_iter().map(|r| r.id).collect();
    ids.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(ids, expected);
}
