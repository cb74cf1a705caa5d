use crate::analysis::worker::AnalysisWorker;
use crate::config::Config;
use crate::history::HistoryStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub history: HistoryStore,
    /// Owns the evaluator; runs at most one analysis at a time.
    pub worker: AnalysisWorker,
}
