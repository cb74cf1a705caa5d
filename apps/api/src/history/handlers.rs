//! Axum route handlers for browsing, deleting, re-running and exporting history.

use std::path::PathBuf;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::analysis::handlers::AnalyzeResponse;
use crate::errors::AppError;
use crate::history::report::{default_export_name, export_entry, render_entry_report, ExportOutcome};
use crate::models::history::HistoryEntry;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HistoryListResponse {
    pub total: usize,
    pub failed: usize,
    pub entries: Vec<HistoryRow>,
}

/// A stored entry plus the fields a listing shows next to it.
#[derive(Serialize)]
pub struct HistoryRow {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub date: String,
    pub failed: bool,
}

impl From<HistoryEntry> for HistoryRow {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            date: entry.date().to_string(),
            failed: entry.evaluation().is_failure(),
            entry,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    /// Remove only the row at this position instead of everything.
    pub index: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RerunRequest {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    /// Target file, or an existing directory to export into.
    pub output_path: String,
}

fn find_entry(state: &AppState, id: &str) -> Result<HistoryEntry, AppError> {
    state
        .history
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("History entry {id} not found")))
}

/// GET /api/v1/history
pub async fn handle_list_history(State(state): State<AppState>) -> Json<HistoryListResponse> {
    let entries: Vec<HistoryRow> = state
        .history
        .load_all()
        .into_iter()
        .map(HistoryRow::from)
        .collect();
    Json(HistoryListResponse {
        total: entries.len(),
        failed: entries.iter().filter(|row| row.failed).count(),
        entries,
    })
}

/// PUT /api/v1/history
///
/// Overwrites the whole history, e.g. to restore a backup. Entries without
/// an id get their derived one.
pub async fn handle_replace_history(
    State(state): State<AppState>,
    Json(mut entries): Json<Vec<HistoryEntry>>,
) -> Result<StatusCode, AppError> {
    entries.iter_mut().for_each(HistoryEntry::ensure_id);
    state.history.replace_all(&entries)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/history/:id
pub async fn handle_get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryEntry>, AppError> {
    find_entry(&state, &id).map(Json)
}

/// DELETE /api/v1/history/:id
pub async fn handle_delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.history.remove(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("History entry {id} not found")))
    }
}

/// DELETE /api/v1/history[?index=N]
pub async fn handle_clear_history(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Result<StatusCode, AppError> {
    match query.index {
        Some(index) => match state.history.remove_at(index)? {
            Some(_) => Ok(StatusCode::NO_CONTENT),
            None => Err(AppError::NotFound(format!("No history entry at position {index}"))),
        },
        None => {
            state.history.clear()?;
            Ok(StatusCode::NO_CONTENT)
        }
    }
}

/// GET /api/v1/history/:id/report
pub async fn handle_entry_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entry = find_entry(&state, &id)?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        render_entry_report(&entry),
    ))
}

/// POST /api/v1/history/:id/rerun
pub async fn handle_rerun_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RerunRequest>>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), AppError> {
    let entry = find_entry(&state, &id)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();

    let source = if entry.path.is_empty() {
        &entry.file
    } else {
        &entry.path
    };
    let source = PathBuf::from(source);
    if source.as_os_str().is_empty() || !source.exists() {
        return Err(AppError::Validation(format!(
            "Arquivo não encontrado: {}",
            source.display()
        )));
    }

    let model = state.config.resolve_model(req.model.as_deref());
    let job_id = state.worker.start(source, model.clone())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse::running(job_id, model)),
    ))
}

/// POST /api/v1/history/:id/export
pub async fn handle_export_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportOutcome>, AppError> {
    let entry = find_entry(&state, &id)?;
    if req.output_path.trim().is_empty() {
        return Err(AppError::Validation("output_path must not be empty".to_string()));
    }

    let mut out = PathBuf::from(req.output_path.trim());
    if out.is_dir() {
        out.push(default_export_name(&entry));
    }
    export_entry(&entry, &out)
        .map(Json)
        .map_err(|e| AppError::Export(format!("Could not write {}: {e}", out.display())))
}
