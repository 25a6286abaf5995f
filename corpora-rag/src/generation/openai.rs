//! OpenAI-compatible chat completion backend with SSE streaming.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use corpora_config::LlmConfig;
use corpora_core::traits::{LlmBackend, TokenStream};
use corpora_core::{CorporaError, Result};

use super::prompt::PromptTemplate;

const TOKEN_CHANNEL_CAPACITY: usize = 64;

/// Chat client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    model: String,
    api_key: String,
    base_url: String,
    template: PromptTemplate,
    client: Client,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("prompt_version", &self.template.version())
            .finish_non_exhaustive()
    }
}

impl OpenAiChat {
    /// Build from config.
    ///
    /// # Errors
    ///
    /// `Validation` when the API key variable is unset or the prompt
    /// version is unknown.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CorporaError::validation(format!(
                "llm API key variable '{}' is not set",
                config.api_key_env
            ))
        })?;
        let template = PromptTemplate::for_version(&config.prompt_version)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CorporaError::internal(format!("http client construction: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            template,
            client,
        })
    }

    fn request_body(&self, query: &str, context: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.template.system().to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: self.template.render_user(query, context),
                },
            ],
            stream,
            temperature: 0.1,
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CorporaError::Llm {
                message: format!("chat request failed: {e}"),
                status: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CorporaError::Llm {
                message: format!("chat endpoint returned {status}: {text}"),
                status: Some(status.as_u16()),
            });
        }
        Ok(response)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Extract token payloads from one SSE buffer segment.
fn parse_sse_lines(buffer: &str) -> (Vec<String>, bool) {
    let mut tokens = Vec::new();
    let mut done = false;

    for line in buffer.lines() {
        let Some(payload) = line.strip_prefix("data: ") else {
            continue;
        };
        if payload.trim() == "[DONE]" {
            done = true;
            break;
        }
        if let Ok(chunk) = serde_json::from_str::<StreamChunk>(payload) {
            if let Some(content) = chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.clone())
            {
                if !content.is_empty() {
                    tokens.push(content);
                }
            }
        }
    }

    (tokens, done)
}

#[async_trait]
impl LlmBackend for OpenAiChat {
    async fn generate_answer(&self, query: &str, context: &str) -> Result<String> {
        let body = self.request_body(query, context, false);
        let response = self.send(&body).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| CorporaError::Llm {
            message: format!("undecodable chat response: {e}"),
            status: None,
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CorporaError::Llm {
                message: "chat response contained no choices".to_string(),
                status: None,
            })
    }

    async fn generate_stream(&self, query: &str, context: &str) -> Result<TokenStream> {
        let body = self.request_body(query, context, true);
        // Establishment errors surface here and are retryable; everything
        // past this point flows through the channel.
        let response = self.send(&body).await?;

        let (sender, receiver) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut pending = String::new();

            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        pending.push_str(&String::from_utf8_lossy(&bytes));
                        // Process only complete events; keep the tail.
                        let Some(cut) = pending.rfind("\n\n") else {
                            continue;
                        };
                        let ready = pending[..cut].to_string();
                        pending = pending[cut + 2..].to_string();

                        let (tokens, done) = parse_sse_lines(&ready);
                        for token in tokens {
                            if sender.send(Ok(token)).await.is_err() {
                                // Consumer cancelled; drop the stream.
                                debug!("token consumer dropped; closing provider stream");
                                return;
                            }
                        }
                        if done {
                            return;
                        }
                    }
                    Err(error) => {
                        let _ = sender
                            .send(Err(CorporaError::Llm {
                                message: format!("stream interrupted: {error}"),
                                status: None,
                            }))
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(receiver)
    }

    fn prompt_version(&self) -> &str {
        self.template.version()
    }
}
