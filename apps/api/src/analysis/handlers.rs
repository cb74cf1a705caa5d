//! Axum route handlers for starting and polling analyses.

use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::prompts::{DOCUMENT_TYPE, REQUIREMENTS};
use crate::analysis::worker::{JobStatus, POLL_INTERVAL_MS};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub path: String,
    /// Blank or absent → configured default model.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub job_id: Uuid,
    pub status: &'static str,
    pub model: String,
    pub poll_interval_ms: u64,
}

impl AnalyzeResponse {
    pub fn running(job_id: Uuid, model: String) -> Self {
        Self {
            job_id,
            status: "running",
            model,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default_model: String,
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RubricResponse {
    pub document_type: &'static str,
    pub requirements: Vec<&'static str>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyses
pub async fn handle_start_analysis(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), AppError> {
    let path = req.path.trim();
    if path.is_empty() {
        return Err(AppError::Validation("path must not be empty".to_string()));
    }
    let model = state.config.resolve_model(req.model.as_deref());
    let job_id = state.worker.start(PathBuf::from(path), model.clone())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse::running(job_id, model)),
    ))
}

/// GET /api/v1/analyses/:job_id
pub async fn handle_analysis_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatus>, AppError> {
    state
        .worker
        .poll(job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Analysis job {job_id} not found")))
}

/// GET /api/v1/models
pub async fn handle_list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        default_model: state.config.default_model.clone(),
        models: state.config.models.clone(),
    })
}

/// GET /api/v1/rubric
pub async fn handle_rubric() -> Json<RubricResponse> {
    Json(RubricResponse {
        document_type: DOCUMENT_TYPE,
        requirements: REQUIREMENTS.to_vec(),
    })
}
