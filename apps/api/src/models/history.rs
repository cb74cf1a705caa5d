use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// One persisted analysis run. `result` keeps whatever structure the model
/// produced (or the error record built by the pipeline), verbatim.
/// Text fields also accept null, numbers or lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Stable identifier derived from `path` and `timestamp`.
    /// Files written before ids existed omit it; see [`HistoryEntry::ensure_id`].
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub file: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub model: String,
    #[serde(default)]
    pub result: Value,
}

impl HistoryEntry {
    /// Builds a fresh entry stamped with the current local time.
    pub fn new(source: &Path, model: &str, result: Value) -> Self {
        let file = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = std::fs::canonicalize(source)
            .unwrap_or_else(|_| source.to_path_buf())
            .to_string_lossy()
            .into_owned();
        let timestamp = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();

        let mut entry = HistoryEntry {
            id: String::new(),
            file,
            path,
            timestamp,
            model: model.to_string(),
            result,
        };
        entry.ensure_id();
        entry
    }

    /// Typed view of one stored row, with its id assigned. A row that is not
    /// an object comes back with empty fields and the row itself as `result`.
    pub fn from_row(row: &Value) -> Self {
        match serde_json::from_value::<HistoryEntry>(row.clone()) {
            Ok(mut entry) => {
                entry.ensure_id();
                entry
            }
            Err(_) => HistoryEntry {
                id: entry_id("", &row.to_string()),
                result: row.clone(),
                ..HistoryEntry::default()
            },
        }
    }

    /// Assigns the derived id when missing. Idempotent.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = entry_id(&self.path, &self.timestamp);
        }
    }

    /// The calendar date part of the timestamp (`2025-03-01T…` → `2025-03-01`).
    pub fn date(&self) -> &str {
        self.timestamp.split('T').next().unwrap_or_default()
    }

    pub fn evaluation(&self) -> EvaluationResult {
        EvaluationResult::classify(&self.result)
    }
}

/// Hex SHA-256 prefix of `path|timestamp`.
pub fn entry_id(path: &str, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Typed view over `HistoryEntry::result`
// ────────────────────────────────────────────────────────────────────────────

/// One rubric line as answered by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationItem {
    #[serde(default, deserialize_with = "lenient_text")]
    pub item: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub detalhes: String,
}

/// The answer shape requested by the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeEvaluation {
    pub validacao: Vec<ValidationItem>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub pontuacao_final: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub melhorias_recomendadas: String,
}

/// Error record written by the pipeline instead of a model answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    #[serde(deserialize_with = "lenient_text")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_extraido: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
    Evaluated(ResumeEvaluation),
    Failed(EvaluationFailure),
    /// Decoded fine but does not follow the requested template.
    Unstructured(Value),
}

impl EvaluationResult {
    pub fn classify(value: &Value) -> Self {
        if value.get("error").is_some() {
            if let Ok(failure) = serde_json::from_value::<EvaluationFailure>(value.clone()) {
                return EvaluationResult::Failed(failure);
            }
        }
        if value.get("validacao").is_some_and(Value::is_array) {
            if let Ok(evaluation) = serde_json::from_value::<ResumeEvaluation>(value.clone()) {
                return EvaluationResult::Evaluated(evaluation);
            }
        }
        EvaluationResult::Unstructured(value.clone())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EvaluationResult::Failed(_))
    }
}

/// Models are asked for strings but routinely answer with numbers, lists or null.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_id_is_stable_and_distinct() {
        let a = entry_id("/tmp/cv.pdf", "2025-03-01T10:00:00.000001");
        let b = entry_id("/tmp/cv.pdf", "2025-03-01T10:00:00.000001");
        let c = entry_id("/tmp/cv.pdf", "2025-03-01T10:00:00.000002");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_legacy_entry_without_id_gets_derived_id() {
        let raw = json!({
            "file": "cv.docx",
            "path": "/home/ana/cv.docx",
            "timestamp": "2024-11-02T09:15:44.120391",
            "model": "llama3.1:8b",
            "result": {"error": "Nenhum JSON encontrado", "raw": "..."}
        });
        let mut entry: HistoryEntry = serde_json::from_value(raw).unwrap();
        assert!(entry.id.is_empty());
        entry.ensure_id();
        assert_eq!(
            entry.id,
            entry_id("/home/ana/cv.docx", "2024-11-02T09:15:44.120391")
        );
        assert_eq!(entry.date(), "2024-11-02");
    }

    #[test]
    fn test_row_with_null_and_numeric_fields_still_projects() {
        let row = json!({
            "file": "cv.pdf",
            "path": "/cv/cv.pdf",
            "timestamp": "2024-06-01T12:00:00.000000",
            "model": null,
            "id": 7,
            "result": {"pontuacao_final": "70"}
        });
        let entry = HistoryEntry::from_row(&row);
        assert_eq!(entry.file, "cv.pdf");
        assert_eq!(entry.model, "");
        assert_eq!(entry.id, "7");
    }

    #[test]
    fn test_non_object_row_keeps_value_as_result() {
        let entry = HistoryEntry::from_row(&json!("stray note"));
        assert!(entry.file.is_empty());
        assert_eq!(entry.result, json!("stray note"));
        assert_eq!(entry.id.len(), 16);
        assert_ne!(entry.id, HistoryEntry::from_row(&json!(42)).id);
    }

    #[test]
    fn test_new_entry_has_basename_and_id() {
        let entry = HistoryEntry::new(Path::new("does/not/exist/cv.pdf"), "gemma3:12b", json!({}));
        assert_eq!(entry.file, "cv.pdf");
        assert_eq!(entry.model, "gemma3:12b");
        assert_eq!(entry.id, entry_id(&entry.path, &entry.timestamp));
        assert!(entry.timestamp.contains('T'));
    }

    #[test]
    fn test_classify_evaluated_with_numeric_score() {
        let value = json!({
            "validacao": [
                {"item": "Coerência geral", "status": "OK", "detalhes": "Bem estruturado"}
            ],
            "pontuacao_final": 85,
            "melhorias_recomendadas": ["Adicionar resultados", "Revisar resumo"]
        });
        match EvaluationResult::classify(&value) {
            EvaluationResult::Evaluated(eval) => {
                assert_eq!(eval.validacao.len(), 1);
                assert_eq!(eval.validacao[0].status, "OK");
                assert_eq!(eval.pontuacao_final, "85");
                assert_eq!(
                    eval.melhorias_recomendadas,
                    "Adicionar resultados\nRevisar resumo"
                );
            }
            other => panic!("expected Evaluated, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_failure() {
        let value = json!({"error": "Falha ao converter JSON: x", "json_extraido": "{", "raw": "{"});
        let result = EvaluationResult::classify(&value);
        assert!(result.is_failure());
        if let EvaluationResult::Failed(f) = result {
            assert_eq!(f.json_extraido.as_deref(), Some("{"));
            assert_eq!(f.file, None);
        }
    }

    #[test]
    fn test_classify_unstructured() {
        let value = json!({"a": 1});
        assert_eq!(
            EvaluationResult::classify(&value),
            EvaluationResult::Unstructured(value.clone())
        );
    }
}
