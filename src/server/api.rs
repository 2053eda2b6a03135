use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};

use crate::{
    error::PatchpilotError,
    generate::{Generator, generate_code, generate_plan},
    orchestrator::{Orchestrator, PipelineReport},
    patch::{
        FileChange, RawPatch, content_text,
        normalize::{normalize, unwrap_double_wrapped},
    },
    publisher::{GitPublisher, PublishRequest, PublishResult},
    task::{Task, TaskStore},
};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub publisher: Arc<GitPublisher>,
    pub planner: Arc<dyn Generator>,
    pub coder: Arc<dyn Generator>,
    pub orchestrator: Orchestrator,
    pub tasks: Arc<dyn TaskStore>,
    pub publish_timeout: Duration,
}

impl AppState {
    pub fn new(
        publisher: Arc<GitPublisher>,
        planner: Arc<dyn Generator>,
        coder: Arc<dyn Generator>,
        tasks: Arc<dyn TaskStore>,
        publish_timeout: Duration,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            Arc::clone(&planner),
            Arc::clone(&coder),
            Arc::clone(&publisher),
            publish_timeout,
        );

        Self {
            publisher,
            planner,
            coder,
            orchestrator,
            tasks,
            publish_timeout,
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

/// File entry as sent by callers. Content may be any JSON value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilePayload {
    pub path: String,
    pub content: Value,
}

impl From<FilePayload> for FileChange {
    fn from(file: FilePayload) -> Self {
        FileChange {
            content: content_text(Some(&file.content)),
            path: file.path,
        }
    }
}

/// Missing fields are left to publisher validation so callers get its
/// messages instead of a deserialization error.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrPayload {
    pub branch_name: String,
    pub commit_message: String,
    pub files: Option<Vec<FilePayload>>,
    pub plan: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPrPayload {
    pub branch_name: String,
    pub commit_message: String,
    pub plan: Option<String>,
    pub patch: Option<RawPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TicketPayload {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct CodePatch {
    pub files: Vec<FileChange>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeResponse {
    pub code_patch: CodePatch,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal { error: String, details: String },
}

impl ApiError {
    /// Map a pipeline error: caller mistakes become 400, everything else a
    /// 500 summarized by `context` with the provider detail attached.
    pub fn from_pipeline(context: &str, err: PatchpilotError) -> Self {
        match err.root() {
            PatchpilotError::Validation(msg) => {
                warn!("{context}: {msg}");
                ApiError::BadRequest(msg.clone())
            }
            _ => {
                error!("{context}: {err}");
                ApiError::Internal {
                    error: context.to_string(),
                    details: err.details(),
                }
            }
        }
    }
}

/// Bodies that are not JSON, or whose fields have the wrong type, are
/// caller mistakes like any other validation failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("rejected request body: {}", rejection.body_text());
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, serde_json::json!({"error": msg}))
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({"error": msg}))
            }
            ApiError::Internal { error, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": error, "details": details}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/pr", post(create_pr))
        .route("/api/pr/raw", post(create_pr_from_raw))
        .route("/api/plan", post(create_plan))
        .route("/api/code", post(create_code))
        .route(
            "/api/tasks",
            get(list_tasks).post(add_task).delete(clear_tasks),
        )
        .route("/api/tasks/{id}/run", post(run_task))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn publish(
    state: &AppState,
    req: PublishRequest,
) -> Result<Json<PublishResult>, ApiError> {
    info!(
        "publishing {} file(s) to {}",
        req.files.len(),
        req.branch_name
    );

    let result = state
        .publisher
        .publish_with_timeout(req, state.publish_timeout)
        .await
        .map_err(|e| ApiError::from_pipeline("PR creation failed.", e))?;

    Ok(Json(result))
}

async fn create_pr(
    State(state): State<SharedState>,
    payload: Result<Json<PrPayload>, JsonRejection>,
) -> Result<Json<PublishResult>, ApiError> {
    let Json(payload) = payload?;

    let files = payload
        .files
        .unwrap_or_default()
        .into_iter()
        .map(FileChange::from)
        .collect();

    let req = PublishRequest {
        branch_name: payload.branch_name,
        commit_message: payload.commit_message,
        files: unwrap_double_wrapped(files),
        plan: payload.plan,
    };

    publish(&state, req).await
}

async fn create_pr_from_raw(
    State(state): State<SharedState>,
    payload: Result<Json<RawPrPayload>, JsonRejection>,
) -> Result<Json<PublishResult>, ApiError> {
    let Json(payload) = payload?;

    let patch = payload
        .patch
        .ok_or_else(|| ApiError::BadRequest("patch is required".into()))?;

    let req = PublishRequest {
        branch_name: payload.branch_name,
        commit_message: payload.commit_message,
        files: normalize(patch),
        plan: payload.plan,
    };

    publish(&state, req).await
}

async fn create_plan(
    State(state): State<SharedState>,
    payload: Result<Json<TicketPayload>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let Json(payload) = payload?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }

    let plan = generate_plan(
        state.planner.as_ref(),
        &payload.title,
        &payload.description,
    )
    .await
    .map_err(|e| ApiError::from_pipeline("Failed to generate plan.", e))?;

    Ok(Json(PlanResponse { plan }))
}

async fn create_code(
    State(state): State<SharedState>,
    payload: Result<Json<TicketPayload>, JsonRejection>,
) -> Result<Json<CodeResponse>, ApiError> {
    let Json(payload) = payload?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }

    let raw = generate_code(
        state.coder.as_ref(),
        &payload.title,
        &payload.description,
    )
    .await
    .map_err(|e| ApiError::from_pipeline("Failed to generate code.", e))?;

    Ok(Json(CodeResponse {
        code_patch: CodePatch {
            files: normalize(raw),
        },
    }))
}

async fn list_tasks(State(state): State<SharedState>) -> Json<Vec<Task>> {
    Json(state.tasks.list())
}

async fn add_task(
    State(state): State<SharedState>,
    payload: Result<Json<Task>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(task) = payload?;

    if task.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }

    info!("received task #{}: {}", task.id, task.title);
    state.tasks.add(task.clone());

    Ok((StatusCode::CREATED, Json(task)))
}

async fn clear_tasks(State(state): State<SharedState>) -> StatusCode {
    state.tasks.clear();
    StatusCode::NO_CONTENT
}

async fn run_task(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<PipelineReport>, ApiError> {
    let task = state
        .tasks
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("task {id} not found")))?;

    let report = state
        .orchestrator
        .run(&task)
        .await
        .map_err(|e| ApiError::from_pipeline("Task run failed.", e))?;

    Ok(Json(report))
}
