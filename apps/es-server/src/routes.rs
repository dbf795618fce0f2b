//! REST handlers for run control.
//!
//! Every run endpoint is mounted twice: under `/run/...` and under the
//! legacy `/model/...` paths that existing clients call.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use es_app::{AppError, RunManager, RunRecord, RunState};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Paths advertised to the legacy registry API.
pub const LEGACY_ENDPOINTS: [&str; 6] = [
    "/model/request",
    "/model/initialize/<run_id>",
    "/model/run/<run_id>",
    "/model/status/<run_id>",
    "/model/results/<run_id>",
    "/model/remove/<run_id>",
];

#[derive(Clone)]
pub struct AppState {
    pub runs: RunManager,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/runs", get(list_runs))
        .route("/run", post(create_run))
        .route("/run/:run_id/initialize", post(initialise_run))
        .route("/run/:run_id/start", post(start_run))
        .route("/run/:run_id/status", get(run_status))
        .route("/run/:run_id/results", get(run_results))
        .route("/run/:run_id/remove", post(remove_run))
        .route("/model/request", post(create_run))
        .route("/model/initialize/:run_id", post(initialise_run))
        .route("/model/run/:run_id", post(start_run))
        .route("/model/status/:run_id", get(run_status))
        .route("/model/results/:run_id", get(run_results))
        .route("/model/remove/:run_id", post(remove_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Maps service errors onto status codes with an `{"error": ...}` body.
struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::RunNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

fn status_body(record: &RunRecord) -> Value {
    json!({
        "run_id": record.id,
        "state": record.state,
        "error": record.error,
        "progress": record.progress,
        "created_at": record.created_at,
        "started_at": record.started_at,
        "finished_at": record.finished_at,
    })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_run(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "run_id": state.runs.create_run() }))
}

async fn list_runs(State(state): State<AppState>) -> Json<Value> {
    let runs: Vec<Value> = state.runs.list().iter().map(status_body).collect();
    Json(Value::Array(runs))
}

/// The body is optional; an empty body means no overrides.
async fn initialise_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let config = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::InvalidConfig(format!("request body is not JSON: {e}")))?
    };

    let record = state.runs.initialise(&run_id, config)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "run_id": record.id,
            "state": record.state,
            "config": record.config,
        })),
    ))
}

/// 400 when the run already ended in error, otherwise the current state.
async fn start_run(State(state): State<AppState>, Path(run_id): Path<String>) -> ApiResult {
    let record = state.runs.start(&run_id)?;
    info!(run_id = %run_id, state = %record.state, "start requested");
    let status = if record.state == RunState::Error {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({
            "run_id": record.id,
            "state": record.state,
            "error": record.error,
        })),
    ))
}

async fn run_status(State(state): State<AppState>, Path(run_id): Path<String>) -> ApiResult {
    let record = state.runs.get(&run_id)?;
    Ok((StatusCode::OK, Json(status_body(&record))))
}

/// 200 with the summary, 400 with the error, 202 while not finished.
async fn run_results(State(state): State<AppState>, Path(run_id): Path<String>) -> ApiResult {
    let record = state.runs.get(&run_id)?;
    Ok(match record.state {
        RunState::Succeeded => (
            StatusCode::OK,
            Json(json!({ "run_id": record.id, "result": record.result })),
        ),
        RunState::Error => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "run_id": record.id, "error": record.error })),
        ),
        _ => (
            StatusCode::ACCEPTED,
            Json(json!({ "run_id": record.id, "state": record.state })),
        ),
    })
}

async fn remove_run(State(state): State<AppState>, Path(run_id): Path<String>) -> Json<Value> {
    if let Some(record) = state.runs.remove(&run_id)
        && record.state == RunState::Running
    {
        warn!(run_id = %run_id, "removed a running run; its outcome will be discarded");
    }
    Json(json!({ "status": "removed", "run_id": run_id }))
}
