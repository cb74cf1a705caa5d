//! Evaluation pipeline — one résumé file in, one history entry out.
//!
//! Flow: extract text → build prompt → evaluator → extract JSON candidate →
//!       lenient decode → wrap into a `HistoryEntry` → append to the store.
//!
//! Every failure before the store becomes an `error` record in the entry's
//! result; only a failed history write is returned as `Err`.

use std::path::Path;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::analysis::decoder::decode_lenient;
use crate::analysis::extractor::extract_json;
use crate::analysis::prompts::{build_prompt, REQUIREMENTS};
use crate::documents::{extract_text_from_file, DocumentError};
use crate::errors::AppError;
use crate::history::HistoryStore;
use crate::llm_client::{Evaluator, EvaluatorOutput};
use crate::models::history::HistoryEntry;

pub const NO_JSON_FOUND: &str = "Nenhum JSON encontrado";

/// Runs the whole pipeline for `path` and persists the entry.
pub async fn validate_resume(
    path: &Path,
    model: &str,
    evaluator: &dyn Evaluator,
    store: &HistoryStore,
) -> Result<HistoryEntry, AppError> {
    info!("Analysing {} with {model}", path.display());
    let result = evaluate_file(path, model, evaluator).await;
    let entry = HistoryEntry::new(path, model, result);
    store.append(entry.clone())?;
    Ok(entry)
}

/// Result value for one file; never fails.
pub async fn evaluate_file(path: &Path, model: &str, evaluator: &dyn Evaluator) -> Value {
    match read_document(path).await {
        Ok(text) => evaluate_text(&text, model, evaluator).await,
        Err(message) => {
            warn!("Skipping model call for {}: {message}", path.display());
            json!({ "error": message, "file": file_name(path) })
        }
    }
}

/// Result value for already-extracted text; never fails.
pub async fn evaluate_text(text: &str, model: &str, evaluator: &dyn Evaluator) -> Value {
    let prompt = build_prompt(text, &REQUIREMENTS);
    let output = evaluator.evaluate(model, &prompt).await;
    match &output {
        EvaluatorOutput::Failed { exit_code, .. } => {
            warn!("Evaluator exited with {exit_code:?}; parsing whatever it printed")
        }
        EvaluatorOutput::TimedOut { after, .. } => {
            warn!("Evaluator timed out after {}s", after.as_secs())
        }
        _ => {}
    }
    interpret_response(output.into_text())
}

/// Turns raw model text into the stored result value.
pub fn interpret_response(response: String) -> Value {
    let Some(candidate) = extract_json(&response) else {
        warn!("No JSON object in model output ({} chars)", response.len());
        return json!({ "error": NO_JSON_FOUND, "raw": response });
    };

    match decode_lenient(candidate) {
        Ok(value) => value,
        Err(e) => {
            warn!("Model output could not be decoded: {e}");
            let candidate = candidate.to_string();
            json!({
                "error": format!("Falha ao converter JSON: {e}"),
                "json_extraido": candidate,
                "raw": response,
            })
        }
    }
}

/// Extraction runs on the blocking pool; failures come back as the message
/// to store under `error`.
async fn read_document(path: &Path) -> Result<String, String> {
    let owned = path.to_path_buf();
    let joined = tokio::task::spawn_blocking(move || extract_text_from_file(&owned)).await;
    match joined {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e @ DocumentError::Unsupported(_))) => Err(e.to_string()),
        Ok(Err(e)) => Err(format!("Falha ao extrair texto: {e}")),
        // pdf-extract panics on some malformed files.
        Err(e) => Err(format!("Falha ao extrair texto: {e}")),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
