//! Cited, delimited, length-bounded context assembly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fusion::FusedCandidate;

/// Fixed answer used whenever no evidence fits the budget. The LLM is not
/// called in that case.
pub const FALLBACK_ANSWER: &str =
    "No hay información suficiente en los documentos del workspace para responder.";

/// A chunk that made it into the prompt, with its citation label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitedChunk {
    /// `S1`, `S2`, ... in inclusion order.
    pub label: String,
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub chunk_index: u32,
    /// Fused (or reranked) score at selection time.
    pub score: f32,
}

/// Result of context assembly.
#[derive(Debug, Clone)]
pub struct BuiltContext {
    /// Prompt-ready context; empty when nothing fit.
    pub context: String,
    /// Chunks actually included, in label order.
    pub included: Vec<CitedChunk>,
}

impl BuiltContext {
    /// Whether no chunk fit the budget.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

/// Greedy context builder under a character budget.
///
/// The delimiters below are part of the prompt contract and must not vary
/// between requests; the anti-injection system prompt tells the model to
/// treat only delimited blocks as evidence.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    budget: usize,
}

impl ContextBuilder {
    /// Create a builder with a character budget for the evidence blocks.
    #[must_use]
    pub const fn new(budget: usize) -> Self {
        Self { budget }
    }

    /// Assemble context from candidates in input order.
    ///
    /// A candidate whose block would exceed the budget is skipped; later,
    /// shorter candidates may still fit. Labels are assigned to included
    /// chunks in order. The trailing `FUENTES` section maps each label to
    /// its `(document_id, chunk_id)` pair and is not counted against the
    /// evidence budget.
    #[must_use]
    pub fn build(&self, candidates: &[FusedCandidate]) -> BuiltContext {
        let mut blocks: Vec<String> = Vec::new();
        let mut included: Vec<CitedChunk> = Vec::new();
        let mut used = 0_usize;

        for candidate in candidates {
            let label = format!("S{}", included.len() + 1);
            let block = format!(
                "<<<CONTEXTO [{label}] doc=\"{title}\" doc_id={doc_id} chunk={index}>>>\n{content}\n<<<FIN [{label}]>>>",
                title = candidate.chunk.document_title,
                doc_id = candidate.chunk.chunk.document_id,
                index = candidate.chunk.chunk.chunk_index,
                content = candidate.chunk.chunk.content,
            );

            // +2 for the blank line between blocks.
            let cost = block.chars().count() + if blocks.is_empty() { 0 } else { 2 };
            if used + cost > self.budget {
                continue;
            }

            used += cost;
            blocks.push(block);
            included.push(CitedChunk {
                label,
                chunk_id: candidate.chunk.chunk.id,
                document_id: candidate.chunk.chunk.document_id,
                document_title: candidate.chunk.document_title.clone(),
                chunk_index: candidate.chunk.chunk.chunk_index,
                score: candidate.rerank_score.unwrap_or(candidate.score),
            });
        }

        if included.is_empty() {
            return BuiltContext {
                context: String::new(),
                included,
            };
        }

        let mut context = blocks.join("\n\n");
        context.push_str("\n\nFUENTES:\n");
        for cited in &included {
            context.push_str(&format!(
                "[{}] document_id={} chunk_id={}\n",
                cited.label, cited.document_id, cited.chunk_id
            ));
        }

        BuiltContext { context, included }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpora_core::traits::ScoredChunk;
    use corpora_core::types::ChunkRecord;

    fn candidate(content: &str, title: &str) -> FusedCandidate {
        FusedCandidate {
            chunk: ScoredChunk {
                chunk: ChunkRecord::new(
                    Uuid::new_v4(),
                    Uuid::new_v4(),
                    0,
                    content,
                    vec![0.0; 4],
                ),
                score: 0.5,
                document_title: title.to_string(),
            },
            score: 0.02,
            dense_rank: Some(1),
            lexical_rank: None,
            rerank_score: None,
            rerank_provenance: None,
        }
    }

    #[test]
    fn test_labels_follow_inclusion_order() {
        let builder = ContextBuilder::new(10_000);
        let built = builder.build(&[
            candidate("primero", "Doc A"),
            candidate("segundo", "Doc B"),
        ]);

        assert_eq!(built.included.len(), 2);
        assert_eq!(built.included[0].label, "S1");
        assert_eq!(built.included[1].label, "S2");
        assert!(built.context.contains("<<<CONTEXTO [S1]"));
        assert!(built.context.contains("<<<FIN [S2]>>>"));
    }

    #[test]
    fn test_sources_section_lists_every_label() {
        let builder = ContextBuilder::new(10_000);
        let built = builder.build(&[candidate("contenido", "Doc")]);

        let sources_at = built.context.find("FUENTES:").unwrap();
        let sources = &built.context[sources_at..];
        assert!(sources.contains(&format!(
            "[S1] document_id={} chunk_id={}",
            built.included[0].document_id, built.included[0].chunk_id
        )));
        // Content is not duplicated inside FUENTES.
        assert!(!sources.contains("contenido"));
    }

    #[test]
    fn test_oversized_chunk_is_skipped_but_smaller_fits() {
        let builder = ContextBuilder::new(220);
        let built = builder.build(&[
            candidate(&"x".repeat(400), "Grande"),
            candidate("cabe", "Chico"),
        ]);

        assert_eq!(built.included.len(), 1);
        assert_eq!(built.included[0].document_title, "Chico");
        assert_eq!(built.included[0].label, "S1");
    }

    #[test]
    fn test_nothing_fits_yields_empty_context() {
        let builder = ContextBuilder::new(10);
        let built = builder.build(&[candidate("demasiado largo para el presupuesto", "Doc")]);
        assert!(built.is_empty());
        assert!(built.context.is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty_context() {
        let builder = ContextBuilder::new(1_000);
        let built = builder.build(&[]);
        assert!(built.is_empty());
    }

    #[test]
    fn test_delimiters_are_stable_across_requests() {
        let builder = ContextBuilder::new(10_000);
        let one = builder.build(&[candidate("a", "Doc")]);
        let two = builder.build(&[candidate("a", "Doc")]);
        // Same shape modulo the random ids.
        assert_eq!(
            one.context.matches("<<<CONTEXTO [S1]").count(),
            two.context.matches("<<<CONTEXTO [S1]").count()
        );
    }
}
