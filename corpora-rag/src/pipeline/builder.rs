//! Composition root for the pipelines.
//!
//! Adapters and config go in once at startup; the built pipelines receive
//! their collaborators by parameter and never reach for globals.

use std::sync::Arc;

use tokio::sync::watch;

use corpora_config::CorporaConfig;
use corpora_core::traits::{
    Clock, ConversationRepository, DocumentRepository, EmbeddingBackend, JobQueue, KeyValueCache,
    LlmBackend, ObjectStore, SystemClock, WorkspaceRepository,
};
use corpora_core::{CorporaError, Result};
use corpora_security::AuditLogger;
use corpora_utils::retry::RetryPolicy;

use crate::chunking::TextChunker;
use crate::embeddings::CachedEmbedder;
use crate::fusion::Reranker;

use super::intake::DocumentIntake;
use super::processor::IngestProcessor;
use super::query::QueryPipeline;
use super::worker::IngestWorker;

/// Builder wiring ports and config into the use-case pipelines.
pub struct PipelineBuilder {
    config: CorporaConfig,
    workspaces: Option<Arc<dyn WorkspaceRepository>>,
    documents: Option<Arc<dyn DocumentRepository>>,
    conversations: Option<Arc<dyn ConversationRepository>>,
    objects: Option<Arc<dyn ObjectStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    cache: Option<Arc<dyn KeyValueCache>>,
    embedding_backend: Option<Arc<dyn EmbeddingBackend>>,
    llm: Option<Arc<dyn LlmBackend>>,
    reranker: Option<Arc<dyn Reranker>>,
    audit: Option<AuditLogger>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Start a builder from loaded configuration.
    #[must_use]
    pub fn new(config: CorporaConfig) -> Self {
        Self {
            config,
            workspaces: None,
            documents: None,
            conversations: None,
            objects: None,
            queue: None,
            cache: None,
            embedding_backend: None,
            llm: None,
            reranker: None,
            audit: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Workspace repository.
    #[must_use]
    pub fn with_workspaces(mut self, workspaces: Arc<dyn WorkspaceRepository>) -> Self {
        self.workspaces = Some(workspaces);
        self
    }

    /// Document repository.
    #[must_use]
    pub fn with_documents(mut self, documents: Arc<dyn DocumentRepository>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Conversation repository.
    #[must_use]
    pub fn with_conversations(mut self, conversations: Arc<dyn ConversationRepository>) -> Self {
        self.conversations = Some(conversations);
        self
    }

    /// Object store for original binaries.
    #[must_use]
    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Ingestion job queue.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Key-value cache backing the embedding cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Embedding provider.
    #[must_use]
    pub fn with_embedding_backend(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.embedding_backend = Some(backend);
        self
    }

    /// Answer-generation provider.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmBackend>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Optional reranker.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Audit logger.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Replace the wall clock, for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.retry.max_attempts,
            base_delay: self.config.retry.base_delay(),
            max_delay: self.config.retry.max_delay(),
        }
    }

    fn embedder(&self) -> Result<Arc<CachedEmbedder>> {
        let backend = self
            .embedding_backend
            .clone()
            .ok_or_else(|| missing("embedding backend"))?;
        let cache = self.cache.clone().ok_or_else(|| missing("key-value cache"))?;
        Ok(Arc::new(CachedEmbedder::new(
            backend,
            cache,
            self.config.cache.ttl(),
        )))
    }

    /// Build the intake use case.
    ///
    /// # Errors
    ///
    /// `Internal` naming the first missing component.
    pub fn build_intake(&self) -> Result<DocumentIntake> {
        Ok(DocumentIntake::new(
            self.workspaces.clone().ok_or_else(|| missing("workspace repository"))?,
            self.documents.clone().ok_or_else(|| missing("document repository"))?,
            self.objects.clone().ok_or_else(|| missing("object store"))?,
            self.queue.clone().ok_or_else(|| missing("job queue"))?,
            self.audit.clone().ok_or_else(|| missing("audit logger"))?,
            self.clock.clone(),
            self.config.ingestion.clone(),
        ))
    }

    /// Build the worker-side processor.
    ///
    /// # Errors
    ///
    /// `Internal` naming the first missing component, `Validation` for
    /// bad chunking geometry.
    pub fn build_processor(&self) -> Result<Arc<IngestProcessor>> {
        let chunker = TextChunker::new(
            self.config.chunking.chunk_size,
            self.config.chunking.overlap,
        )?;
        Ok(Arc::new(IngestProcessor::new(
            self.documents.clone().ok_or_else(|| missing("document repository"))?,
            self.objects.clone().ok_or_else(|| missing("object store"))?,
            chunker,
            self.embedder()?,
            self.retry_policy(),
            self.clock.clone(),
        )))
    }

    /// Build a worker loop around `processor`.
    ///
    /// # Errors
    ///
    /// `Internal` when the queue is missing.
    pub fn build_worker(
        &self,
        processor: Arc<IngestProcessor>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<IngestWorker> {
        Ok(IngestWorker::new(
            self.queue.clone().ok_or_else(|| missing("job queue"))?,
            processor,
            &self.config.ingestion,
            shutdown,
        ))
    }

    /// Build the retrieval-and-answer pipeline.
    ///
    /// # Errors
    ///
    /// `Internal` naming the first missing component.
    pub fn build_query(&self) -> Result<QueryPipeline> {
        Ok(QueryPipeline::new(
            self.workspaces.clone().ok_or_else(|| missing("workspace repository"))?,
            self.documents.clone().ok_or_else(|| missing("document repository"))?,
            self.conversations
                .clone()
                .ok_or_else(|| missing("conversation repository"))?,
            self.embedder()?,
            self.llm.clone().ok_or_else(|| missing("llm backend"))?,
            self.reranker.clone(),
            self.audit.clone().ok_or_else(|| missing("audit logger"))?,
            self.clock.clone(),
            self.retry_policy(),
            self.config.retrieval.clone(),
        ))
    }
}

fn missing(component: &str) -> CorporaError {
    CorporaError::internal(format!("pipeline builder missing component: {component}"))
}
