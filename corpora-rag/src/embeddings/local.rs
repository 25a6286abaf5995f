//! Deterministic local embedding backend.
//!
//! Hash-seeded pseudo-embeddings for tests and offline development: the
//! same text always maps to the same unit vector, so similarity search
//! behaves sensibly without a provider in the loop.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use corpora_core::traits::{EmbeddingBackend, EmbeddingTask};
use corpora_core::{CorporaError, Result};

use super::cache::normalize;

/// Offline embedding backend with stable per-text vectors.
#[derive(Debug, Clone)]
pub struct LocalEmbeddings {
    model_id: String,
    dimensions: usize,
}

impl LocalEmbeddings {
    /// Create a backend producing `dimensions`-wide vectors.
    #[must_use]
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(normalize(text).as_bytes());
        let mut seed = [0_u8; 32];
        seed.copy_from_slice(&digest);
        let mut rng = StdRng::from_seed(seed);

        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0_f32..1.0))
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for LocalEmbeddings {
    async fn embed(&self, texts: &[String], _task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(CorporaError::Embedding {
                message: "embed called with empty input".to_string(),
                status: None,
            });
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
