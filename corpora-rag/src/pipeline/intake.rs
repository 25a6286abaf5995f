//! Synchronous ingestion intake.
//!
//! Runs inside the request handler: authorize, validate, store the
//! binary, create the `PENDING` document, enqueue the processing job. The
//! caller answers with the document id immediately; all heavy lifting is
//! the worker's problem.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use corpora_config::IngestionConfig;
use corpora_core::traits::{Clock, DocumentRepository, JobQueue, ObjectStore, WorkspaceRepository};
use corpora_core::types::{AuditRecord, Document, DocumentStatus};
use corpora_core::{Actor, CorporaError, Result};
use corpora_security::{AccessKind, AuditLogger};

use super::{load_workspace_authorized, INGEST_JOB};

/// An upload as received from the (out-of-scope) router layer.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Intake and reprocessing use cases.
pub struct DocumentIntake {
    workspaces: Arc<dyn WorkspaceRepository>,
    documents: Arc<dyn DocumentRepository>,
    objects: Arc<dyn ObjectStore>,
    queue: Arc<dyn JobQueue>,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
    config: IngestionConfig,
}

impl std::fmt::Debug for DocumentIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIntake")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentIntake {
    pub(crate) fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        documents: Arc<dyn DocumentRepository>,
        objects: Arc<dyn ObjectStore>,
        queue: Arc<dyn JobQueue>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            workspaces,
            documents,
            objects,
            queue,
            audit,
            clock,
            config,
        }
    }

    /// Accept an upload into `workspace_id` and enqueue its processing.
    ///
    /// Returns the `PENDING` document; the response maps to 202 at the
    /// router layer.
    ///
    /// # Errors
    ///
    /// `Forbidden`/`NotFound` on policy denial, `Validation` on MIME or
    /// size violations, `Storage`/`Database` on adapter failures.
    pub async fn submit(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        request: IntakeRequest,
    ) -> Result<Document> {
        load_workspace_authorized(&self.workspaces, actor, workspace_id, AccessKind::Write)
            .await?;

        if !self.config.allowed_mime.iter().any(|m| m == &request.mime_type) {
            return Err(CorporaError::validation(format!(
                "unsupported media type '{}'",
                request.mime_type
            )));
        }
        if request.bytes.len() > self.config.max_file_bytes {
            return Err(CorporaError::validation(format!(
                "file exceeds the {} byte limit",
                self.config.max_file_bytes
            )));
        }
        if request.title.trim().is_empty() {
            return Err(CorporaError::validation("document title must not be empty"));
        }

        let now = self.clock.now();
        let mut document = Document::new(workspace_id, request.title.trim(), actor.user_id, now)
            .with_file(&request.file_name, &request.mime_type)
            .with_tags(request.tags)
            .with_metadata(request.metadata);
        document.source = request.source;

        let key = format!("{workspace_id}/{}/{}", document.id, request.file_name);
        let stored_key = self
            .objects
            .put(&key, &request.bytes, &request.mime_type)
            .await?;
        document.storage_key = Some(stored_key);

        self.documents.create(&document).await?;
        self.queue
            .enqueue(INGEST_JOB, document.id, self.config.job_max_attempts)
            .await?;

        info!(
            workspace_id = %workspace_id,
            document_id = %document.id,
            mime_type = %request.mime_type,
            size = request.bytes.len(),
            "document accepted for ingestion"
        );
        self.audit.emit(
            AuditRecord::new("document.submitted", now)
                .with_workspace(workspace_id)
                .with_actor(actor.user_id)
                .with_payload(json!({
                    "document_id": document.id,
                    "mime_type": request.mime_type,
                })),
        );

        Ok(document)
    }

    /// Queue a fresh ingestion run for an existing document.
    ///
    /// # Errors
    ///
    /// `Conflict` while the document is `PROCESSING`; `NotFound` when it
    /// does not exist in the workspace.
    pub async fn reprocess(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        document_id: Uuid,
    ) -> Result<Document> {
        load_workspace_authorized(&self.workspaces, actor, workspace_id, AccessKind::Write)
            .await?;

        let document = self
            .documents
            .get(workspace_id, document_id)
            .await?
            .ok_or(CorporaError::not_found("document", document_id))?;

        if document.status == DocumentStatus::Processing {
            return Err(CorporaError::conflict(
                "document is currently being processed",
                Some(document_id),
            ));
        }

        self.documents.reset_for_reprocess(document_id).await?;
        self.queue
            .enqueue(INGEST_JOB, document_id, self.config.job_max_attempts)
            .await?;

        let now = self.clock.now();
        info!(workspace_id = %workspace_id, document_id = %document_id, "document reprocess queued");
        self.audit.emit(
            AuditRecord::new("document.reprocess", now)
                .with_workspace(workspace_id)
                .with_actor(actor.user_id)
                .with_payload(json!({"document_id": document_id})),
        );

        let mut updated = document;
        updated.status = DocumentStatus::Pending;
        updated.error_message = None;
        Ok(updated)
    }
}
