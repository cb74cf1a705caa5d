//! Document text extraction — turns an uploaded résumé into plain text for the prompt.
//!
//! Supported: `.docx` (non-blank paragraphs, one per line) and `.pdf`
//! (text of every page, via `pdf-extract`). Everything else is rejected
//! with [`DocumentError::Unsupported`], which the pipeline records as an
//! error entry instead of aborting.

mod docx;

use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DocumentError {
    /// Carries the lowercased extension including the dot (empty if none).
    #[error("Formato não suportado: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid docx markup: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Docx,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let ext = extension_of(path);
        match ext.as_str() {
            ".docx" => Ok(DocumentKind::Docx),
            ".pdf" => Ok(DocumentKind::Pdf),
            _ => Err(DocumentError::Unsupported(ext)),
        }
    }
}

/// Lowercased extension with its leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Blocking; callers on the async runtime should go through `spawn_blocking`.
pub fn extract_text_from_file(path: &Path) -> Result<String, DocumentError> {
    let kind = DocumentKind::from_path(path)?;
    let text = match kind {
        DocumentKind::Docx => docx::extract_text(path)?,
        DocumentKind::Pdf => extract_text_from_pdf(path)?,
    };
    debug!(
        "Extracted {} chars from {} ({:?})",
        text.chars().count(),
        path.display(),
        kind
    );
    Ok(text)
}

fn extract_text_from_pdf(path: &Path) -> Result<String, DocumentError> {
    pdf_extract::extract_text(path).map_err(|e| DocumentError::Pdf(e.to_string()))
}
