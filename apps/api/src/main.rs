mod analysis;
mod config;
mod documents;
mod errors;
mod history;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::worker::AnalysisWorker;
use crate::config::Config;
use crate::history::HistoryStore;
use crate::llm_client::{Evaluator, OllamaClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting résumé validator v{}", env!("CARGO_PKG_VERSION"));

    let history = HistoryStore::new(config.history_file.clone());
    info!(
        "History file: {} ({} entries)",
        history.path().display(),
        history.load_all().len()
    );

    let client = OllamaClient::new(config.evaluator_bin.clone(), config.evaluator_timeout);
    info!(
        "Evaluator: {} (timeout {}s, default model {})",
        client.program(),
        config.evaluator_timeout.as_secs(),
        config.default_model
    );
    let evaluator: Arc<dyn Evaluator> = Arc::new(client);

    let worker = AnalysisWorker::new(evaluator, history.clone());

    let state = AppState {
        config: config.clone(),
        history,
        worker,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
