//! MIME-dispatched text extraction for ingested binaries.

mod docx;
mod pdf;

use corpora_core::{CorporaError, Result};

/// DOCX container MIME type.
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Extracts a UTF-8 text body from an uploaded binary.
///
/// Extraction failures are permanent: a corrupt file will not become
/// readable on retry, so errors surface as `Validation` and drive the
/// document to `FAILED` without burning queue attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    /// Create an extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extract text from `bytes` according to `mime_type`.
    ///
    /// # Errors
    ///
    /// `Validation` for unsupported MIME types or undecodable content.
    pub fn extract(&self, mime_type: &str, bytes: &[u8]) -> Result<String> {
        match mime_type {
            "text/plain" | "text/markdown" => Ok(Self::extract_plain(bytes)),
            "application/pdf" => pdf::extract(bytes),
            MIME_DOCX => docx::extract(bytes),
            other => Err(CorporaError::validation(format!(
                "unsupported mime type '{other}'"
            ))),
        }
    }

    /// Plain text: decode as UTF-8, replacing invalid sequences.
    fn extract_plain(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
