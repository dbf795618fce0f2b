//! Run lifecycle: create, initialise, start, poll, remove.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::batch::{BatchServices, BatchSummary};
use crate::config::BatchConfig;
use crate::error::{AppError, AppResult};
use crate::progress::BatchProgressEvent;

pub type RunId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Initialised,
    Running,
    Succeeded,
    Error,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Error)
    }

    /// The only legal state changes. Terminal states are absorbing.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Pending | Initialised, Initialised)
                | (Pending | Initialised, Running)
                | (Running, Succeeded | Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "PENDING",
            RunState::Initialised => "INITIALISED",
            RunState::Running => "RUNNING",
            RunState::Succeeded => "SUCCEEDED",
            RunState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one run, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: RunId,
    pub state: RunState,
    /// Overrides supplied at initialisation.
    pub config: serde_json::Value,
    pub result: Option<BatchSummary>,
    pub error: Option<String>,
    pub progress: Option<BatchProgressEvent>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl RunRecord {
    fn new(id: RunId) -> Self {
        Self {
            id,
            state: RunState::Pending,
            config: serde_json::Value::Object(serde_json::Map::new()),
            result: None,
            error: None,
            progress: None,
            created_at: now(),
            started_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: RunState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::debug!(run_id = %self.id, from = %self.state, to = %next, "ignored transition");
            return false;
        }
        self.state = next;
        true
    }
}

type RunTable = HashMap<RunId, RunRecord>;

fn lock(runs: &Mutex<RunTable>) -> MutexGuard<'_, RunTable> {
    runs.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// In-memory registry of runs. Records are not persisted across restarts.
#[derive(Clone)]
pub struct RunManager {
    runs: Arc<Mutex<RunTable>>,
    services: BatchServices,
    base_config: Arc<BatchConfig>,
    id_prefix: String,
}

impl RunManager {
    pub fn new(services: BatchServices, base_config: BatchConfig) -> Self {
        Self {
            runs: Arc::new(Mutex::new(HashMap::new())),
            services,
            base_config: Arc::new(base_config),
            id_prefix: "run".to_string(),
        }
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn base_config(&self) -> &BatchConfig {
        &self.base_config
    }

    pub fn create_run(&self) -> RunId {
        let id = format!("{}-{}", self.id_prefix, uuid::Uuid::new_v4());
        lock(&self.runs).insert(id.clone(), RunRecord::new(id.clone()));
        tracing::info!(run_id = %id, "run created");
        id
    }

    /// Store configuration overrides for a run that has not started.
    ///
    /// Overrides are checked against the base configuration here so a bad
    /// value is reported to the caller instead of failing the run later.
    /// Runs that already started are returned unchanged.
    pub fn initialise(&self, id: &str, config: serde_json::Value) -> AppResult<RunRecord> {
        let mut runs = lock(&self.runs);
        let record = runs
            .get_mut(id)
            .ok_or_else(|| AppError::RunNotFound(id.to_string()))?;

        if record.state.can_transition_to(RunState::Initialised) {
            self.base_config.with_overrides(&config)?;
            record.config = config;
            record.transition(RunState::Initialised);
            tracing::info!(run_id = %id, "run initialised");
        }
        Ok(record.clone())
    }

    /// Launch the batch in a background task.
    ///
    /// Starting a run that is running or finished returns its current state.
    pub fn start(&self, id: &str) -> AppResult<RunRecord> {
        let config = {
            let mut runs = lock(&self.runs);
            let record = runs
                .get_mut(id)
                .ok_or_else(|| AppError::RunNotFound(id.to_string()))?;
            if !record.state.can_transition_to(RunState::Running) {
                return Ok(record.clone());
            }

            let config = self.base_config.with_overrides(&record.config)?;
            record.transition(RunState::Running);
            record.started_at = Some(now());
            config
        };

        self.spawn_batch(id.to_string(), Arc::new(config));
        self.get(id)
    }

    fn spawn_batch(&self, id: RunId, config: Arc<BatchConfig>) {
        let orchestrator = self.services.orchestrator(config);
        let runs = self.runs.clone();

        tokio::spawn(async move {
            tracing::info!(run_id = %id, "run started");

            let progress_runs = runs.clone();
            let progress_id = id.clone();
            let batch = tokio::spawn(async move {
                let mut on_progress = move |event: BatchProgressEvent| {
                    if let Some(record) = lock(&progress_runs).get_mut(&progress_id) {
                        record.progress = Some(event);
                    }
                };
                let progress: &mut (dyn FnMut(BatchProgressEvent) + Send) = &mut on_progress;
                orchestrator.run_with_progress(Some(progress)).await
            });

            let outcome = match batch.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(AppError::Task(join_err.to_string())),
            };

            let mut runs = lock(&runs);
            let Some(record) = runs.get_mut(&id) else {
                tracing::debug!(run_id = %id, "run removed before completion");
                return;
            };
            match outcome {
                Ok(summary) => {
                    tracing::info!(
                        run_id = %id,
                        success = summary.counts.success,
                        failed = summary.counts.failed,
                        "run succeeded"
                    );
                    record.transition(RunState::Succeeded);
                    record.result = Some(summary);
                }
                Err(err) => {
                    tracing::error!(run_id = %id, error = %err, "run failed");
                    record.transition(RunState::Error);
                    record.error = Some(err.to_string());
                }
            }
            record.finished_at = Some(now());
        });
    }

    pub fn get(&self, id: &str) -> AppResult<RunRecord> {
        lock(&self.runs)
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::RunNotFound(id.to_string()))
    }

    /// Forget a run. Unknown ids are ignored; a running batch finishes but
    /// its outcome is discarded.
    pub fn remove(&self, id: &str) -> Option<RunRecord> {
        let removed = lock(&self.runs).remove(id);
        if removed.is_some() {
            tracing::info!(run_id = %id, "run removed");
        }
        removed
    }

    /// All runs, oldest first.
    pub fn list(&self) -> Vec<RunRecord> {
        let mut runs: Vec<RunRecord> = lock(&self.runs).values().cloned().collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        runs
    }

    /// Poll until the run reaches a terminal state.
    pub async fn wait(&self, id: &str, poll: Duration) -> AppResult<RunRecord> {
        loop {
            let record = self.get(id)?;
            if record.state.is_terminal() {
                return Ok(record);
            }
            tokio::time::sleep(poll).await;
        }
    }
}
