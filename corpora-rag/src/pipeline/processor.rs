//! Worker-side document processing.
//!
//! One invocation takes a claimed job's document from `PENDING` to
//! `READY` (or `FAILED`). Idempotency rests on the status CAS: a second
//! claim for the same document observes `PROCESSING`/`READY` and becomes
//! a no-op. Transient provider trouble releases the document back to
//! `PENDING` and bubbles an error so the worker nacks; permanent trouble
//! is persisted as a terminal `FAILED` and acked.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use corpora_core::traits::{Clock, DocumentRepository, EmbeddingTask, ObjectStore};
use corpora_core::types::{ChunkRecord, Document, DocumentStatus};
use corpora_core::{CorporaError, Result};
use corpora_security::InjectionDetector;
use corpora_utils::retry::{classify, retry, ErrorClass, RetryPolicy};

use crate::chunking::TextChunker;
use crate::embeddings::CachedEmbedder;
use crate::extract::TextExtractor;

/// Longest error message persisted on a failed document.
const ERROR_MESSAGE_LIMIT: usize = 500;

/// Outcome of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Document reached `READY` with this many chunks.
    Completed { chunks: usize },
    /// Another worker got there first (or the document vanished).
    Skipped,
    /// Terminal failure persisted on the document.
    Failed { message: String },
}

/// Extract → chunk → embed → detect → persist, with status transitions.
pub struct IngestProcessor {
    documents: Arc<dyn DocumentRepository>,
    objects: Arc<dyn ObjectStore>,
    extractor: TextExtractor,
    chunker: TextChunker,
    embedder: Arc<CachedEmbedder>,
    detector: InjectionDetector,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IngestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestProcessor")
            .field("chunker", &self.chunker)
            .finish_non_exhaustive()
    }
}

impl IngestProcessor {
    pub(crate) fn new(
        documents: Arc<dyn DocumentRepository>,
        objects: Arc<dyn ObjectStore>,
        chunker: TextChunker,
        embedder: Arc<CachedEmbedder>,
        retry_policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            documents,
            objects,
            extractor: TextExtractor::new(),
            chunker,
            embedder,
            detector: InjectionDetector::new(),
            retry_policy,
            clock,
        }
    }

    /// Process one document end to end.
    ///
    /// # Errors
    ///
    /// Only transient errors escape (the document has been released back
    /// to `PENDING` first); everything else resolves to a
    /// [`ProcessOutcome`].
    pub async fn process(&self, document_id: Uuid) -> Result<ProcessOutcome> {
        let Some(document) = self.documents.get_any(document_id).await? else {
            warn!(document_id = %document_id, "claimed job for a missing document");
            return Ok(ProcessOutcome::Skipped);
        };

        if matches!(
            document.status,
            DocumentStatus::Processing | DocumentStatus::Ready
        ) {
            info!(document_id = %document_id, status = document.status.as_str(), "skipping idempotent claim");
            return Ok(ProcessOutcome::Skipped);
        }

        let claimed = self
            .documents
            .transition_status(document_id, DocumentStatus::Pending, DocumentStatus::Processing)
            .await?;
        if !claimed {
            info!(document_id = %document_id, "lost the processing CAS; skipping");
            return Ok(ProcessOutcome::Skipped);
        }

        match self.run_stages(&document).await {
            Ok((updated, chunks)) => {
                // Single transaction: drop prior chunks, insert new, update
                // the document row. A database failure here is terminal and
                // the stored binary is kept.
                let chunk_count = chunks.len();
                if let Err(error) = self
                    .documents
                    .save_document_with_chunks(&updated, &chunks)
                    .await
                {
                    let message =
                        truncate(&format!("chunk persistence failed: {error}"), ERROR_MESSAGE_LIMIT);
                    self.documents.set_failed(document_id, &message).await?;
                    warn!(document_id = %document_id, %error, "atomic chunk persistence failed");
                    return Ok(ProcessOutcome::Failed { message });
                }

                self.documents
                    .transition_status(
                        document_id,
                        DocumentStatus::Processing,
                        DocumentStatus::Ready,
                    )
                    .await?;
                info!(document_id = %document_id, chunks = chunk_count, "document ready");
                Ok(ProcessOutcome::Completed {
                    chunks: chunk_count,
                })
            }
            Err(error) if classify(&error) == ErrorClass::Transient => {
                // Release so a later claim can start over.
                self.documents
                    .transition_status(
                        document_id,
                        DocumentStatus::Processing,
                        DocumentStatus::Pending,
                    )
                    .await?;
                warn!(document_id = %document_id, %error, "transient processing failure; released");
                Err(error)
            }
            Err(error) => {
                let message = truncate(&error.to_string(), ERROR_MESSAGE_LIMIT);
                self.documents.set_failed(document_id, &message).await?;
                warn!(document_id = %document_id, %error, "document failed permanently");
                Ok(ProcessOutcome::Failed { message })
            }
        }
    }

    /// Mark a document failed from outside the normal flow (deadline
    /// exceeded, retries exhausted).
    pub async fn fail_document(&self, document_id: Uuid, reason: &str) -> Result<()> {
        self.documents
            .set_failed(document_id, &truncate(reason, ERROR_MESSAGE_LIMIT))
            .await
    }

    async fn run_stages(&self, document: &Document) -> Result<(Document, Vec<ChunkRecord>)> {
        let request_id = document.id.to_string();

        let storage_key = document.storage_key.as_deref().ok_or_else(|| {
            CorporaError::validation("document has no stored binary to process")
        })?;

        let bytes = retry(&self.retry_policy, &request_id, || {
            self.objects.get(storage_key)
        })
        .await?;

        let mime_type = document
            .mime_type
            .as_deref()
            .ok_or_else(|| CorporaError::validation("document has no mime type"))?;
        let text = self.extractor.extract(mime_type, &bytes)?;

        let pieces = self.chunker.chunk(&text);
        if pieces.is_empty() {
            return Err(CorporaError::validation(
                "document produced no chunks after extraction",
            ));
        }

        let texts: Vec<String> = pieces.iter().map(|piece| piece.content.clone()).collect();
        let embeddings = retry(&self.retry_policy, &request_id, || {
            self.embedder
                .embed_batch(&texts, EmbeddingTask::RetrievalDocument)
        })
        .await?;

        let chunks: Vec<ChunkRecord> = pieces
            .into_iter()
            .zip(embeddings)
            .map(|(piece, embedding)| {
                let security = self.detector.score(&piece.content);
                ChunkRecord::new(
                    document.id,
                    document.workspace_id,
                    piece.index,
                    piece.content,
                    embedding,
                )
                .with_security(security)
            })
            .collect();

        let mut updated = document.clone();
        updated.status = DocumentStatus::Processing;
        updated.error_message = None;
        updated.updated_at = self.clock.now();

        Ok((updated, chunks))
    }
}

fn truncate(message: &str, limit: usize) -> String {
    if message.chars().count() <= limit {
        message.to_string()
    } else {
        let cut: String = message.chars().take(limit).collect();
        format!("{cut}…")
    }
}
