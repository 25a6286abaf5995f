//! Cache-aside wrapper around an embedding backend.
//!
//! Keys are namespaced by model, task space and normalization version so a
//! model swap or normalization change can never serve stale vectors.
//! Cache trouble is logged and treated as a miss: the provider is the
//! source of truth, the cache only saves money.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use corpora_core::traits::{EmbeddingBackend, EmbeddingTask, KeyValueCache};
use corpora_core::{CorporaError, Result};

/// Version tag of [`normalize`]; bump when its behaviour changes.
pub const NORMALIZATION_VERSION: &str = "v1";

/// Normalization v1: trim, collapse internal whitespace runs to one space.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Embedding provider with a best-effort cache in front.
pub struct CachedEmbedder {
    backend: Arc<dyn EmbeddingBackend>,
    cache: Arc<dyn KeyValueCache>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for CachedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("model_id", &self.backend.model_id())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CachedEmbedder {
    /// Wrap `backend` with `cache`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        cache: Arc<dyn KeyValueCache>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            cache,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Vector width this embedder produces.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.backend.dimensions()
    }

    /// Cache key for `text` in the given task space.
    #[must_use]
    pub fn cache_key(&self, text: &str, task: EmbeddingTask) -> String {
        let digest = Sha256::digest(normalize(text).as_bytes());
        format!(
            "emb:{}:{}:{}:{:x}",
            self.backend.model_id(),
            task.as_str(),
            NORMALIZATION_VERSION,
            digest
        )
    }

    /// Embed a single query text.
    ///
    /// # Errors
    ///
    /// `Embedding` on empty input, provider failure or dimension mismatch.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let vectors = self
            .embed_batch(&texts, EmbeddingTask::RetrievalQuery)
            .await?;
        vectors.into_iter().next().ok_or_else(|| CorporaError::Embedding {
            message: "provider returned no vector for query".to_string(),
            status: None,
        })
    }

    /// Embed `texts`, preserving 1:1 positional correspondence.
    ///
    /// Duplicate texts (after normalization) are requested from the
    /// provider once and replicated to every original position.
    ///
    /// # Errors
    ///
    /// `Embedding` on empty input, provider failure, cardinality or
    /// dimension mismatch.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        task: EmbeddingTask,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(CorporaError::Embedding {
                message: "embed_batch called with empty input".to_string(),
                status: None,
            });
        }
        if texts.iter().any(|text| normalize(text).is_empty()) {
            return Err(CorporaError::Embedding {
                message: "embed_batch input contains an empty text".to_string(),
                status: None,
            });
        }

        let keys: Vec<String> = texts.iter().map(|t| self.cache_key(t, task)).collect();
        let mut resolved: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        for (position, key) in keys.iter().enumerate() {
            if let Some(vector) = self.cache_get(key).await {
                self.hits.fetch_add(1, Ordering::Relaxed);
                resolved[position] = Some(vector);
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Unique misses, in first-seen order.
        let mut miss_keys: Vec<&str> = Vec::new();
        let mut miss_texts: Vec<String> = Vec::new();
        for (position, slot) in resolved.iter().enumerate() {
            if slot.is_none() && !miss_keys.contains(&keys[position].as_str()) {
                miss_keys.push(keys[position].as_str());
                miss_texts.push(texts[position].clone());
            }
        }

        if !miss_texts.is_empty() {
            debug!(
                total = texts.len(),
                unique_misses = miss_texts.len(),
                task = task.as_str(),
                "requesting embeddings from provider"
            );
            let fresh = self.provider_embed(&miss_texts, task).await?;
            for (key, vector) in miss_keys.iter().zip(fresh.iter()) {
                self.cache_set(key, vector).await;
            }
            for (position, key) in keys.iter().enumerate() {
                if resolved[position].is_none() {
                    if let Some(found) = miss_keys.iter().position(|k| *k == key.as_str()) {
                        resolved[position] = Some(fresh[found].clone());
                    }
                }
            }
        }

        resolved
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| CorporaError::Embedding {
                    message: "provider response missing a requested vector".to_string(),
                    status: None,
                })
            })
            .collect()
    }

    /// `(hits, misses, hit_rate)` counters since construction.
    #[must_use]
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        (hits, misses, rate)
    }

    async fn provider_embed(
        &self,
        texts: &[String],
        task: EmbeddingTask,
    ) -> Result<Vec<Vec<f32>>> {
        let limit = self.backend.batch_limit().max(1);
        let expected_dim = self.backend.dimensions();
        let mut vectors = Vec::with_capacity(texts.len());

        for window in texts.chunks(limit) {
            let batch = self.backend.embed(window, task).await?;
            if batch.len() != window.len() {
                return Err(CorporaError::Embedding {
                    message: format!(
                        "provider returned {} vectors for {} inputs",
                        batch.len(),
                        window.len()
                    ),
                    status: None,
                });
            }
            for vector in batch {
                if vector.len() != expected_dim {
                    return Err(CorporaError::Embedding {
                        message: format!(
                            "embedding dimension {} does not match declared {}",
                            vector.len(),
                            expected_dim
                        ),
                        status: None,
                    });
                }
                vectors.push(vector);
            }
        }

        Ok(vectors)
    }

    async fn cache_get(&self, key: &str) -> Option<Vec<f32>> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<f32>>(&bytes) {
                Ok(vector) if vector.len() == self.backend.dimensions() => Some(vector),
                Ok(_) => {
                    warn!(key, "cached embedding has wrong dimension; ignoring");
                    None
                }
                Err(error) => {
                    warn!(key, %error, "cached embedding is undecodable; ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(key, %error, "embedding cache get failed; treating as miss");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, vector: &[f32]) {
        match serde_json::to_vec(vector) {
            Ok(bytes) => {
                if let Err(error) = self.cache.set(key, &bytes, self.ttl).await {
                    warn!(key, %error, "embedding cache set failed; continuing");
                }
            }
            Err(error) => warn!(key, %error, "failed to encode embedding for cache"),
        }
    }
}
