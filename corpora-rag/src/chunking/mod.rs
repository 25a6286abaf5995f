//! Sliding-window document chunking.
//!
//! Chunking is character-based: chunk `k` starts at
//! `k * (chunk_size - overlap)` and spans up to `chunk_size` characters,
//! so adjacent full chunks share exactly `overlap` characters. Slices are
//! whitespace-trimmed after cutting; the raw window still covers the full
//! document, which keeps the overlap regions byte-faithful.

use serde::{Deserialize, Serialize};

use corpora_core::{CorporaError, Result};

/// A chunk cut from a document body, before embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPiece {
    /// Contiguous 0-based index in emission order.
    pub index: u32,
    /// Character offset of the untrimmed window in the source text.
    pub offset: usize,
    /// Trimmed window content, never empty.
    pub content: String,
}

/// Character-budgeted sliding-window chunker.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// `Validation` when `chunk_size` is zero or `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CorporaError::validation("chunk_size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(CorporaError::validation(
                "overlap must be smaller than chunk_size",
            ));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Split `text` into ordered, non-empty chunks.
    ///
    /// Empty or whitespace-only input produces no chunks. The final window
    /// stops the walk even if the stride would allow another start inside
    /// it, so no trailing sub-overlap fragment is emitted.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<ChunkPiece> {
        let chars: Vec<char> = text.chars().collect();
        if chars.iter().all(|c| c.is_whitespace()) {
            return Vec::new();
        }

        let stride = self.chunk_size - self.overlap;
        let mut pieces = Vec::new();
        let mut start = 0_usize;
        let mut index = 0_u32;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                pieces.push(ChunkPiece {
                    index,
                    offset: start,
                    content: trimmed.to_string(),
                });
                index += 1;
            }
            if end == chars.len() {
                break;
            }
            start += stride;
        }

        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fit_single_chunk() {
        let chunker = TextChunker::new(10, 0).unwrap();
        let chunks = chunker.chunk("abcdefghij");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "abcdefghij");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_overlap_window_is_shared() {
        let chunker = TextChunker::new(10, 3).unwrap();
        let text = "abcdefghijklmno"; // 15 chars
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.len(), 10);
        assert_eq!(chunks[1].content.len(), 8);
        // Last 3 chars of chunk 0 equal the first 3 chars of chunk 1.
        assert_eq!(&chunks[0].content[7..], &chunks[1].content[..3]);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let chunker = TextChunker::new(10, 2).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn test_indices_are_contiguous() {
        let chunker = TextChunker::new(5, 1).unwrap();
        let chunks = chunker.chunk("aaaa bbbb cccc dddd");
        for (i, piece) in chunks.iter().enumerate() {
            assert_eq!(piece.index, u32::try_from(i).unwrap());
            assert!(!piece.content.is_empty());
        }
    }

    #[test]
    fn test_full_coverage_without_overlap() {
        let chunker = TextChunker::new(4, 0).unwrap();
        let text = "abcdefghijkl";
        let chunks = chunker.chunk(text);
        let glued: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(glued, text);
    }

    #[test]
    fn test_unicode_is_sliced_on_char_boundaries() {
        let chunker = TextChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk("áéíóú ñandú");
        assert!(!chunks.is_empty());
        let rebuilt_ok = chunks.iter().all(|c| c.content.chars().count() <= 4);
        assert!(rebuilt_ok);
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(10, 10).is_err());
        assert!(TextChunker::new(10, 12).is_err());
    }
}
