//! PDF text extraction via lopdf.

use corpora_core::{CorporaError, Result};

/// Extract the text of every page, pages separated by blank lines.
///
/// Scanned PDFs without a text layer come out (near) empty; the caller
/// treats an empty extraction as a failed ingestion, which is the intended
/// behaviour since OCR is out of scope.
pub fn extract(bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| CorporaError::validation(format!("unreadable pdf: {e}")))?;

    let mut pages_text = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => pages_text.push(text),
            Err(e) => {
                // A single undecodable page should not sink the document.
                tracing::warn!(page = page_number, error = %e, "skipping unreadable pdf page");
            }
        }
    }

    if pages_text.is_empty() {
        return Err(CorporaError::validation(
            "pdf contains no extractable text",
        ));
    }

    Ok(pages_text.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_rejected() {
        assert!(extract(b"%PDF-garbage").is_err());
    }
}
