//! Document management use cases (listing, metadata, soft delete).
//!
//! Ingestion itself lives in `corpora-rag`; this service covers the
//! read/maintenance surface around stored documents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use corpora_core::traits::repository::DocumentFilter;
use corpora_core::traits::{Clock, DocumentRepository, WorkspaceRepository};
use corpora_core::types::{AuditRecord, Document};
use corpora_core::{Actor, CorporaError, Result};
use corpora_security::access_control::authorize_workspace;
use corpora_security::{AccessKind, AuditLogger};

/// Workspace-scoped document queries and maintenance.
pub struct DocumentService {
    workspaces: Arc<dyn WorkspaceRepository>,
    documents: Arc<dyn DocumentRepository>,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService").finish_non_exhaustive()
    }
}

impl DocumentService {
    /// Create the service.
    #[must_use]
    pub fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        documents: Arc<dyn DocumentRepository>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workspaces,
            documents,
            audit,
            clock,
        }
    }

    /// List documents the actor may read, newest first.
    ///
    /// # Errors
    ///
    /// Policy denials and repository errors.
    pub async fn list(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        filter: DocumentFilter,
        cursor: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Document>> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::Read).await?;
        self.documents
            .list(workspace_id, &filter, cursor, limit)
            .await
    }

    /// Fetch one document.
    ///
    /// # Errors
    ///
    /// `NotFound` for missing, soft-deleted or hidden documents.
    pub async fn get(&self, actor: Actor, workspace_id: Uuid, id: Uuid) -> Result<Document> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::Read).await?;
        self.documents
            .get(workspace_id, id)
            .await?
            .ok_or(CorporaError::not_found("document", id))
    }

    /// Soft-delete a document: hidden from listings, excluded from
    /// retrieval, history preserved.
    ///
    /// # Errors
    ///
    /// `NotFound` when the document is absent; policy denials otherwise.
    pub async fn delete(&self, actor: Actor, workspace_id: Uuid, id: Uuid) -> Result<()> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::Write).await?;

        if !self.documents.soft_delete(workspace_id, id).await? {
            return Err(CorporaError::not_found("document", id));
        }

        self.audit.emit(
            AuditRecord::new("document.deleted", self.clock.now())
                .with_workspace(workspace_id)
                .with_actor(actor.user_id)
                .with_payload(json!({"document_id": id})),
        );
        Ok(())
    }

    /// Update title, tags or metadata. `None` fields are left untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` when the document is absent; policy denials otherwise.
    pub async fn update(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        id: Uuid,
        title: Option<String>,
        tags: Option<Vec<String>>,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::Write).await?;

        if let Some(new_title) = &title {
            if new_title.trim().is_empty() {
                return Err(CorporaError::validation("document title must not be empty"));
            }
        }

        if !self
            .documents
            .update_metadata(workspace_id, id, title, tags, metadata)
            .await?
        {
            return Err(CorporaError::not_found("document", id));
        }
        Ok(())
    }
}
