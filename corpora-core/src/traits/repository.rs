//! Repository ports over the relational store.
//!
//! Implementations live in `corpora-storage`; every method is
//! workspace-scoped where the data model demands it and enforces a hard
//! ceiling on list sizes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    AuditRecord, ChunkRecord, Conversation, Document, DocumentStatus, FeedbackVote, Message,
    Visibility, Workspace, WorkspaceAcl,
};
use crate::Actor;

/// Hard ceiling applied to every list operation.
pub const LIST_LIMIT_MAX: u32 = 100;

/// Filters accepted by [`DocumentRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub tag: Option<String>,
}

/// A chunk with the raw score assigned by one retrieval arm.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: ChunkRecord,
    /// Cosine similarity for dense search, `ts_rank` for lexical search.
    pub score: f32,
    /// Title of the owning document, for citation labels.
    pub document_title: String,
}

/// Documents and their chunks.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persist a new document row.
    async fn create(&self, document: &Document) -> Result<()>;

    /// Fetch a document within its workspace. Soft-deleted rows are hidden.
    async fn get(&self, workspace_id: Uuid, id: Uuid) -> Result<Option<Document>>;

    /// Fetch a document by id alone; used by the worker, which holds the
    /// workspace via the job payload.
    async fn get_any(&self, id: Uuid) -> Result<Option<Document>>;

    /// List documents, newest first, paged by `created_at` cursor.
    /// `limit` is clamped to [`LIST_LIMIT_MAX`].
    async fn list(
        &self,
        workspace_id: Uuid,
        filter: &DocumentFilter,
        cursor: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Document>>;

    /// Soft-delete a document. Returns whether a row was affected.
    async fn soft_delete(&self, workspace_id: Uuid, id: Uuid) -> Result<bool>;

    /// Update the mutable metadata of a document.
    async fn update_metadata(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        title: Option<String>,
        tags: Option<Vec<String>>,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool>;

    /// Compare-and-set status transition. Returns `false` when the current
    /// status is not `from` (the CAS lost).
    async fn transition_status(
        &self,
        id: Uuid,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<bool>;

    /// Terminal failure: set `FAILED` with a truncated message.
    async fn set_failed(&self, id: Uuid, message: &str) -> Result<()>;

    /// Reset a document for reprocessing: status `PENDING`, error cleared.
    async fn reset_for_reprocess(&self, id: Uuid) -> Result<()>;

    /// Atomically replace a document's chunks and update its row in a
    /// single transaction: delete prior chunks, insert `chunks`, update the
    /// document.
    async fn save_document_with_chunks(
        &self,
        document: &Document,
        chunks: &[ChunkRecord],
    ) -> Result<()>;

    /// Top-`k` chunks by cosine similarity to `embedding`, scoped to the
    /// workspace and excluding soft-deleted documents.
    async fn find_chunks_similar(
        &self,
        workspace_id: Uuid,
        embedding: &[f32],
        k: u32,
    ) -> Result<Vec<ScoredChunk>>;

    /// Top-`k` chunks by full-text relevance to `query`, same scoping.
    async fn find_chunks_full_text(
        &self,
        workspace_id: Uuid,
        query: &str,
        k: u32,
    ) -> Result<Vec<ScoredChunk>>;

    /// Number of chunks currently stored for a document.
    async fn chunk_count(&self, document_id: Uuid) -> Result<u64>;
}

/// Workspaces and their ACL grants.
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Persist a new workspace. Duplicate `(owner, name)` surfaces as
    /// [`crate::CorporaError::Conflict`].
    async fn create(&self, workspace: &Workspace) -> Result<()>;

    /// Fetch a workspace by id, archived or not.
    async fn get(&self, id: Uuid) -> Result<Option<Workspace>>;

    /// Workspaces visible to `actor`: all for admins; owned, granted and
    /// org-readable for employees. Archived rows excluded unless asked for.
    async fn list_visible(&self, actor: Actor, include_archived: bool) -> Result<Vec<Workspace>>;

    /// Change visibility. Returns whether a row was affected.
    async fn update_visibility(&self, id: Uuid, visibility: Visibility) -> Result<bool>;

    /// Mark a workspace archived. Idempotent.
    async fn archive(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// All ACL rows for a workspace.
    async fn find_acl(&self, workspace_id: Uuid) -> Result<Vec<WorkspaceAcl>>;

    /// Grant read access. Granting twice is a no-op.
    async fn grant(&self, workspace_id: Uuid, user_id: Uuid) -> Result<()>;

    /// Revoke read access. Returns whether a grant existed.
    async fn revoke(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool>;
}

/// Conversations and messages.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create(&self, conversation: &Conversation) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>>;

    async fn append_message(&self, message: &Message) -> Result<()>;

    /// Latest messages, oldest first, `limit` clamped to [`LIST_LIMIT_MAX`].
    async fn get_messages(&self, conversation_id: Uuid, limit: u32) -> Result<Vec<Message>>;

    /// Delete every message in a conversation.
    async fn clear(&self, conversation_id: Uuid) -> Result<()>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<()>;
}

/// Feedback votes on assistant messages.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Insert or replace the vote for `(message, user)`.
    async fn upsert_vote(&self, vote: &FeedbackVote) -> Result<()>;

    async fn get_vote(&self, message_id: Uuid, user_id: Uuid) -> Result<Option<FeedbackVote>>;
}
