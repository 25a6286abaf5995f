//! Retrieval and answer pipeline, sync and streaming.
//!
//! Phases: authorize → sanitize → embed query → dense search → lexical
//! search (best-effort) → fuse → injection filter → rerank (optional) →
//! context build → generate. The streaming variant emits a typed event
//! sequence and observes a cancellation flag at every token boundary.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use corpora_config::RetrievalConfig;
use corpora_core::traits::{
    Clock, ConversationRepository, DocumentRepository, LlmBackend, WorkspaceRepository,
};
use corpora_core::types::{AuditRecord, FilterMode, Message, MessageRole};
use corpora_core::{Actor, CorporaError, Result};
use corpora_security::{AccessKind, AuditLogger, InjectionFilter};
use corpora_utils::retry::{retry, RetryPolicy};

use crate::context::{BuiltContext, CitedChunk, ContextBuilder, FALLBACK_ANSWER};
use crate::embeddings::CachedEmbedder;
use crate::fusion::{dense_passthrough, reciprocal_rank_fusion, FusedCandidate, Reranker};

use super::load_workspace_authorized;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Per-request overrides accepted by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Result count, clamped to the configured maximum.
    pub top_k: Option<u32>,
    /// Whether lexical search participates.
    pub hybrid: Option<bool>,
    /// Per-workspace filter mode override.
    pub filter_mode: Option<FilterMode>,
    /// Conversation to append this exchange to.
    pub conversation_id: Option<Uuid>,
}

/// Wall-clock phase timings reported with every answer.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct AnswerTimings {
    pub retrieval_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
}

/// A completed answer with its citations.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Chunks actually cited, in label order.
    pub sources: Vec<CitedChunk>,
    pub timings: AnswerTimings,
    /// Whether the fixed fallback was used instead of the LLM.
    pub fallback: bool,
}

/// Streaming event sequence: `Start`, then `Token`s, then exactly one of
/// `End` or `Error`. A cancelled stream ends silently with none of the
/// terminal events.
#[derive(Debug, Clone)]
pub enum AnswerEvent {
    Start { sources: Vec<CitedChunk> },
    Token(String),
    End { timings: AnswerTimings, tokens: usize },
    Error { code: String, message: String },
}

/// Caller-side cancellation for a streaming answer.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation; the producer stops at the next token boundary.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

/// The retrieval-and-answer use case.
pub struct QueryPipeline {
    workspaces: Arc<dyn WorkspaceRepository>,
    documents: Arc<dyn DocumentRepository>,
    conversations: Arc<dyn ConversationRepository>,
    embedder: Arc<CachedEmbedder>,
    llm: Arc<dyn LlmBackend>,
    reranker: Option<Arc<dyn Reranker>>,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    config: RetrievalConfig,
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct Evidence {
    built: BuiltContext,
    retrieval_ms: u64,
}

impl QueryPipeline {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        documents: Arc<dyn DocumentRepository>,
        conversations: Arc<dyn ConversationRepository>,
        embedder: Arc<CachedEmbedder>,
        llm: Arc<dyn LlmBackend>,
        reranker: Option<Arc<dyn Reranker>>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
        retry_policy: RetryPolicy,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            workspaces,
            documents,
            conversations,
            embedder,
            llm,
            reranker,
            audit,
            clock,
            retry_policy,
            config,
        }
    }

    /// Answer `query` against `workspace_id` synchronously.
    ///
    /// # Errors
    ///
    /// `Forbidden`/`NotFound` on denial, `Validation` on an empty query,
    /// provider and database errors from the pipeline stages.
    pub async fn answer(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        query: &str,
        options: QueryOptions,
    ) -> Result<Answer> {
        let started = Instant::now();
        let evidence = self
            .retrieve(actor, workspace_id, query, &options)
            .await?;

        if evidence.built.is_empty() {
            debug!(workspace_id = %workspace_id, "no context fit; emitting fallback");
            let answer = Answer {
                text: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
                timings: AnswerTimings {
                    retrieval_ms: evidence.retrieval_ms,
                    generation_ms: 0,
                    total_ms: elapsed_ms(started),
                },
                fallback: true,
            };
            self.record_turn(actor, workspace_id, &options, query, &answer.text, &answer.sources)
                .await?;
            return Ok(answer);
        }

        let request_id = Uuid::new_v4().to_string();
        let generation_started = Instant::now();
        let text = retry(&self.retry_policy, &request_id, || {
            self.llm.generate_answer(query, &evidence.built.context)
        })
        .await?;

        let answer = Answer {
            text,
            sources: evidence.built.included,
            timings: AnswerTimings {
                retrieval_ms: evidence.retrieval_ms,
                generation_ms: elapsed_ms(generation_started),
                total_ms: elapsed_ms(started),
            },
            fallback: false,
        };
        self.record_turn(actor, workspace_id, &options, query, &answer.text, &answer.sources)
            .await?;

        info!(
            workspace_id = %workspace_id,
            sources = answer.sources.len(),
            total_ms = answer.timings.total_ms,
            "query answered"
        );
        Ok(answer)
    }

    /// Open a streaming answer. Retrieval runs before this returns, so
    /// authorization and validation failures surface as plain errors
    /// rather than `Error` events.
    ///
    /// # Errors
    ///
    /// Same as [`Self::answer`], plus stream-establishment failures.
    pub async fn answer_stream(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        query: &str,
        options: QueryOptions,
    ) -> Result<(mpsc::Receiver<AnswerEvent>, CancelHandle)> {
        let started = Instant::now();
        let evidence = self
            .retrieve(actor, workspace_id, query, &options)
            .await?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = CancelHandle { sender: cancel_tx };

        if evidence.built.is_empty() {
            let timings = AnswerTimings {
                retrieval_ms: evidence.retrieval_ms,
                generation_ms: 0,
                total_ms: elapsed_ms(started),
            };
            let conversations = self
                .conversation_target(actor, workspace_id, &options, query)
                .await?;
            tokio::spawn(async move {
                let _ = events_tx.send(AnswerEvent::Start { sources: Vec::new() }).await;
                let _ = events_tx
                    .send(AnswerEvent::Token(FALLBACK_ANSWER.to_string()))
                    .await;
                let _ = events_tx.send(AnswerEvent::End { timings, tokens: 1 }).await;
                if let Some(target) = conversations {
                    target.append(FALLBACK_ANSWER, &[]).await;
                }
            });
            return Ok((events_rx, handle));
        }

        // Only stream establishment is retried; token errors surface raw.
        let request_id = Uuid::new_v4().to_string();
        let mut tokens = retry(&self.retry_policy, &request_id, || {
            self.llm.generate_stream(query, &evidence.built.context)
        })
        .await?;

        let sources = evidence.built.included.clone();
        let retrieval_ms = evidence.retrieval_ms;
        let conversations = self
            .conversation_target(actor, workspace_id, &options, query)
            .await?;

        tokio::spawn(async move {
            if events_tx
                .send(AnswerEvent::Start { sources: sources.clone() })
                .await
                .is_err()
            {
                return;
            }

            let generation_started = Instant::now();
            let mut token_count = 0_usize;
            let mut transcript = String::new();

            loop {
                if *cancel_rx.borrow() {
                    info!("answer stream cancelled by caller");
                    return;
                }
                let Some(item) = tokens.recv().await else {
                    break;
                };
                match item {
                    Ok(token) => {
                        token_count += 1;
                        transcript.push_str(&token);
                        if events_tx.send(AnswerEvent::Token(token)).await.is_err() {
                            // Consumer went away; closing `tokens` shuts the
                            // provider stream down.
                            return;
                        }
                    }
                    Err(error) => {
                        let _ = events_tx
                            .send(AnswerEvent::Error {
                                code: error.code().as_str().to_string(),
                                message: error.to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }

            let timings = AnswerTimings {
                retrieval_ms,
                generation_ms: elapsed_ms(generation_started),
                total_ms: retrieval_ms + elapsed_ms(generation_started),
            };
            let _ = events_tx
                .send(AnswerEvent::End {
                    timings,
                    tokens: token_count,
                })
                .await;
            if let Some(target) = conversations {
                target.append(&transcript, &sources).await;
            }
        });

        Ok((events_rx, handle))
    }

    async fn retrieve(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Evidence> {
        let started = Instant::now();

        let workspace = match load_workspace_authorized(
            &self.workspaces,
            actor,
            workspace_id,
            AccessKind::Read,
        )
        .await
        {
            Ok(workspace) => workspace,
            Err(error) => {
                self.audit.emit(
                    AuditRecord::new("access.denied", self.clock.now())
                        .with_workspace(workspace_id)
                        .with_actor(actor.user_id)
                        .with_payload(json!({
                            "access": "read",
                            "code": error.code().as_str(),
                        })),
                );
                return Err(error);
            }
        };

        // Archived workspaces answer no queries for non-admins.
        if workspace.is_archived() && !actor.is_admin() {
            return Err(CorporaError::forbidden("workspace is archived"));
        }

        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(CorporaError::validation("query must not be empty"));
        }
        let top_k = options
            .top_k
            .unwrap_or(self.config.top_k_default)
            .clamp(1, self.config.top_k_max) as usize;

        let request_id = Uuid::new_v4().to_string();
        let query_embedding = retry(&self.retry_policy, &request_id, || {
            self.embedder.embed_query(trimmed)
        })
        .await?;

        let dense = self
            .documents
            .find_chunks_similar(workspace_id, &query_embedding, self.config.n_dense)
            .await?;

        let hybrid = options.hybrid.unwrap_or(self.config.hybrid);
        let lexical = if hybrid {
            match self
                .documents
                .find_chunks_full_text(workspace_id, trimmed, self.config.n_lex)
                .await
            {
                Ok(hits) => Some(hits),
                Err(error) => {
                    warn!(%error, "lexical search failed; continuing dense-only");
                    None
                }
            }
        } else {
            None
        };

        let candidates = match lexical {
            Some(lexical_hits) => reciprocal_rank_fusion(dense, lexical_hits),
            None => dense_passthrough(dense),
        };

        let filter = InjectionFilter::new(
            options.filter_mode.unwrap_or(self.config.filter_mode),
            self.config.risk_threshold,
            self.config.downrank_penalty,
        );
        let filtered = filter.apply(
            candidates
                .into_iter()
                .map(|candidate| {
                    let score = candidate.score;
                    (candidate, score)
                })
                .collect(),
            |candidate| &candidate.chunk.chunk.security,
        );

        let mut selected: Vec<FusedCandidate> = filtered
            .into_iter()
            .take(top_k)
            .map(|(mut candidate, score)| {
                candidate.score = score;
                candidate
            })
            .collect();

        if let Some(reranker) = &self.reranker {
            match reranker.rerank(trimmed, selected.clone()).await {
                Ok(reordered) => selected = reordered,
                Err(error) => {
                    warn!(reranker = reranker.name(), %error, "reranker failed; using fused order");
                }
            }
        }

        let built = ContextBuilder::new(self.config.context_budget).build(&selected);
        debug!(
            workspace_id = %workspace_id,
            candidates = selected.len(),
            included = built.included.len(),
            "context assembled"
        );

        Ok(Evidence {
            built,
            retrieval_ms: elapsed_ms(started),
        })
    }

    /// Resolve the conversation named in `options`, verifying it belongs
    /// to this workspace and actor.
    async fn conversation_target(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        options: &QueryOptions,
        query: &str,
    ) -> Result<Option<ConversationTarget>> {
        let Some(conversation_id) = options.conversation_id else {
            return Ok(None);
        };
        let conversation = self
            .conversations
            .get(conversation_id)
            .await?
            .filter(|c| c.workspace_id == workspace_id && c.owner_user_id == actor.user_id)
            .ok_or(CorporaError::not_found("conversation", conversation_id))?;

        Ok(Some(ConversationTarget {
            repository: self.conversations.clone(),
            conversation_id: conversation.id,
            query: query.to_string(),
            now: self.clock.now(),
        }))
    }

    async fn record_turn(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        options: &QueryOptions,
        query: &str,
        answer: &str,
        sources: &[CitedChunk],
    ) -> Result<()> {
        if let Some(target) = self
            .conversation_target(actor, workspace_id, options, query)
            .await?
        {
            target.append(answer, sources).await;
        }
        Ok(())
    }
}

/// A verified conversation the pipeline may append the exchange to.
struct ConversationTarget {
    repository: Arc<dyn ConversationRepository>,
    conversation_id: Uuid,
    query: String,
    now: chrono::DateTime<chrono::Utc>,
}

impl ConversationTarget {
    /// Append the user/assistant pair. History persistence is best-effort:
    /// a failure here must not void an already-generated answer.
    async fn append(&self, answer: &str, sources: &[CitedChunk]) {
        if !self.query.is_empty() {
            let user = Message::new(self.conversation_id, MessageRole::User, &self.query, self.now);
            if let Err(error) = self.repository.append_message(&user).await {
                warn!(%error, "failed to record user message");
                return;
            }
        }
        let snapshot = serde_json::to_value(sources).unwrap_or_else(|_| json!([]));
        let assistant = Message::new(self.conversation_id, MessageRole::Assistant, answer, self.now)
            .with_sources(snapshot);
        if let Err(error) = self.repository.append_message(&assistant).await {
            warn!(%error, "failed to record assistant message");
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
