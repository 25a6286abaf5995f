//! DOCX text extraction: unzip the container, walk `word/document.xml`.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use corpora_core::{CorporaError, Result};

/// Extract paragraph text from a DOCX binary.
pub fn extract(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CorporaError::validation(format!("unreadable docx container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| CorporaError::validation(format!("docx missing document part: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| CorporaError::validation(format!("undecodable docx document part: {e}")))?;

    parse_document_xml(&xml)
}

/// Pull the text runs (`w:t`) out of the document XML, emitting a newline
/// at the end of each paragraph (`w:p`).
fn parse_document_xml(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref element)) if element.local_name().as_ref() == b"t" => {
                in_text_run = true;
            }
            Ok(Event::End(ref element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(content)) if in_text_run => {
                let decoded = content
                    .unescape()
                    .map_err(|e| CorporaError::validation(format!("invalid docx text run: {e}")))?;
                text.push_str(&decoded);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(CorporaError::validation(format!("malformed docx xml: {e}")));
            }
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>Primer parrafo.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Segundo </w:t></w:r><w:r><w:t>parrafo.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;

        let text = parse_document_xml(xml).unwrap();
        assert_eq!(text, "Primer parrafo.\nSegundo parrafo.\n");
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Tom &amp; Jerry</w:t></w:r></w:p>
        </w:body></w:document>"#;

        let text = parse_document_xml(xml).unwrap();
        assert_eq!(text.trim(), "Tom & Jerry");
    }
}
