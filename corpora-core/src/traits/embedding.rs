//! Embedding provider port.

use async_trait::async_trait;

use crate::error::Result;

/// Embedding space a text is encoded into.
///
/// Queries and documents live in separate task spaces; the cache key and
/// the provider request both carry the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingTask {
    RetrievalQuery,
    RetrievalDocument,
}

impl EmbeddingTask {
    /// Stable label used in cache keys and provider requests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RetrievalQuery => "retrieval_query",
            Self::RetrievalDocument => "retrieval_document",
        }
    }
}

/// A provider capable of encoding texts into fixed-width vectors.
///
/// `embed` must return one vector per input, positionally. Implementations
/// translate HTTP failures into [`crate::CorporaError::Embedding`] with the
/// response status attached so the retry envelope can classify them.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Encode `texts` in the given task space.
    async fn embed(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>>;

    /// Vector width produced by this backend.
    fn dimensions(&self) -> usize;

    /// Model identifier, namespaced into every cache key.
    fn model_id(&self) -> &str;

    /// Largest batch a single provider call accepts.
    fn batch_limit(&self) -> usize {
        10
    }
}
