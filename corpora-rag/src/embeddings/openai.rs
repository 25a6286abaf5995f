//! OpenAI-compatible embedding backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use corpora_core::traits::{EmbeddingBackend, EmbeddingTask};
use corpora_core::{CorporaError, Result};
use corpora_config::EmbeddingConfig;

/// Embedding client for any OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    model: String,
    dimensions: usize,
    batch_limit: usize,
    api_key: String,
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddings {
    /// Build from config; the API key is read from the configured
    /// environment variable so secrets never live in config files.
    ///
    /// # Errors
    ///
    /// `Validation` when the key variable is unset.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CorporaError::validation(format!(
                "embedding API key variable '{}' is not set",
                config.api_key_env
            ))
        })?;

        Ok(Self {
            model: config.model_id.clone(),
            dimensions: config.dimensions,
            batch_limit: config.batch_limit,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String], _task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(CorporaError::Embedding {
                message: "embed called with empty input".to_string(),
                status: None,
            });
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: Some(self.dimensions),
            encoding_format: "float",
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CorporaError::Embedding {
                message: format!("embedding request failed: {e}"),
                status: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CorporaError::Embedding {
                message: format!("embedding endpoint returned {status}: {body}"),
                status: Some(status.as_u16()),
            });
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| CorporaError::Embedding {
                message: format!("undecodable embedding response: {e}"),
                status: None,
            })?;

        // The API may reorder entries; restore input order by index.
        let mut data = parsed.data;
        data.sort_by_key(|entry| entry.index);
        Ok(data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }
}
