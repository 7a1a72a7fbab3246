//! Text extraction for the supported document formats.

mod docx;
mod pdf;

use std::path::Path;
use thiserror::Error;

/// Errors raised while turning document bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Plain-text document is not valid UTF-8.
    #[error("Text is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
    /// Word document could not be read.
    #[error("Failed to read DOCX document: {0}")]
    Docx(String),
    /// PDF document could not be loaded.
    #[error("Failed to read PDF document: {0}")]
    Pdf(String),
}

/// Formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `.txt`, decoded as strict UTF-8.
    Text,
    /// `.docx`, paragraph text joined with newlines.
    Docx,
    /// `.pdf`, page text in page order.
    Pdf,
}

impl DocumentKind {
    /// Classify an object name by its extension, ignoring case.
    pub fn from_filename(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::Text),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Lowercase extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

/// Extract the full text of a document.
pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = match kind {
        DocumentKind::Text => std::str::from_utf8(bytes)?.to_string(),
        DocumentKind::Docx => docx::extract(bytes)?,
        DocumentKind::Pdf => pdf::extract(bytes)?,
    };
    tracing::debug!(
        kind = kind.extension(),
        bytes = bytes.len(),
        chars = text.chars().count(),
        "Extracted document text"
    );
    Ok(text)
}
