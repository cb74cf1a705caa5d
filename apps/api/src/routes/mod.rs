pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::history::handlers as history;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route("/api/v1/models", get(analysis::handle_list_models))
        .route("/api/v1/rubric", get(analysis::handle_rubric))
        .route("/api/v1/analyses", post(analysis::handle_start_analysis))
        .route(
            "/api/v1/analyses/:job_id",
            get(analysis::handle_analysis_status),
        )
        // History API
        .route(
            "/api/v1/history",
            get(history::handle_list_history)
                .put(history::handle_replace_history)
                .delete(history::handle_clear_history),
        )
        .route(
            "/api/v1/history/:id",
            get(history::handle_get_entry).delete(history::handle_delete_entry),
        )
        .route(
            "/api/v1/history/:id/report",
            get(history::handle_entry_report),
        )
        .route(
            "/api/v1/history/:id/rerun",
            post(history::handle_rerun_entry),
        )
        .route(
            "/api/v1/history/:id/export",
            post(history::handle_export_entry),
        )
        .with_state(state)
}
