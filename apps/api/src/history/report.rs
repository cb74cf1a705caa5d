//! Human-readable rendering of a history entry, and file export.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::documents::extension_of;
use crate::models::history::{EvaluationResult, HistoryEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// The formatted report from [`render_entry_report`].
    Markdown,
    /// Pretty-printed entry JSON.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub written_path: PathBuf,
    pub format: ExportFormat,
    /// True when the requested format could not be produced and plain text
    /// was written next to the requested path instead.
    pub fallback: bool,
}

/// Markdown report: title, metadata, the rubric answers when the result has
/// the expected shape, then the full result body pretty-printed.
pub fn render_entry_report(entry: &HistoryEntry) -> String {
    let mut md = format!("# Análise de Currículo - {}\n\n", entry.file);
    let source = if entry.path.is_empty() {
        &entry.file
    } else {
        &entry.path
    };
    md.push_str(&format!("- **Arquivo:** {source}\n"));
    md.push_str(&format!("- **Data:** {}\n", entry.timestamp));
    md.push_str(&format!("- **Modelo:** {}\n\n", entry.model));

    if let EvaluationResult::Evaluated(eval) = entry.evaluation() {
        for item in &eval.validacao {
            let title = if item.item.is_empty() {
                "Item"
            } else {
                &item.item
            };
            md.push_str(&format!("## {title}\n\n"));
            md.push_str(&format!("**Status:** {}\n\n", item.status));
            md.push_str(&format!("**Detalhes:** {}\n\n", item.detalhes));
        }
        md.push_str(&format!("## Pontuação Final\n\n{}\n\n", eval.pontuacao_final));
        if !eval.melhorias_recomendadas.is_empty() {
            md.push_str(&format!(
                "## Melhorias Recomendadas\n\n{}\n\n",
                eval.melhorias_recomendadas
            ));
        }
    }

    md.push_str("## Resultado\n\n```json\n");
    for line in pretty(&entry.result).lines() {
        md.push_str(line);
        md.push('\n');
    }
    md.push_str("```\n");
    md
}

/// `<stem>_analise.md`, the name used when exporting into a directory.
pub fn default_export_name(entry: &HistoryEntry) -> String {
    let stem = Path::new(&entry.file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "result".to_string());
    format!("{stem}_analise.md")
}

/// Writes `entry` to `out_path`, picking the format from the extension:
/// `.md` gets the report; `.pdf` has no renderer here, so it falls back to a
/// `.txt` sibling with the entry JSON; anything else gets the entry JSON.
pub fn export_entry(entry: &HistoryEntry, out_path: &Path) -> io::Result<ExportOutcome> {
    let outcome = match extension_of(out_path).as_str() {
        ".md" | ".markdown" => {
            std::fs::write(out_path, render_entry_report(entry))?;
            ExportOutcome {
                written_path: out_path.to_path_buf(),
                format: ExportFormat::Markdown,
                fallback: false,
            }
        }
        ".pdf" => {
            let txt_path = out_path.with_extension("txt");
            warn!(
                "PDF export unavailable, writing text to {}",
                txt_path.display()
            );
            std::fs::write(&txt_path, pretty(entry))?;
            ExportOutcome {
                written_path: txt_path,
                format: ExportFormat::Text,
                fallback: true,
            }
        }
        _ => {
            std::fs::write(out_path, pretty(entry))?;
            ExportOutcome {
                written_path: out_path.to_path_buf(),
                format: ExportFormat::Text,
                fallback: false,
            }
        }
    };
    info!(
        "Exported history entry {} to {}",
        entry.id,
        outcome.written_path.display()
    );
    Ok(outcome)
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
