//! Document and chunk entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed dimensionality of every stored embedding.
pub const EMBEDDING_DIM: usize = 768;

/// Document processing lifecycle.
///
/// `Pending → Processing → (Ready | Failed)`; reprocessing resets a
/// non-`Processing` document back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    /// Wire representation, also used as the database enum value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }

    /// Parse the database representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "READY" => Some(Self::Ready),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An ingested source document within one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    /// Free-form provenance label ("upload", a URL, ...).
    pub source: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Object-storage key of the original binary.
    pub storage_key: Option<String>,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub tags: Vec<String>,
    /// Opaque caller-supplied metadata.
    pub metadata: serde_json::Value,
    pub uploader_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete marker: hides from listings and excludes from retrieval.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a pending document awaiting ingestion.
    #[must_use]
    pub fn new(
        workspace_id: Uuid,
        title: impl Into<String>,
        uploader_user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            title: title.into(),
            source: None,
            file_name: None,
            mime_type: None,
            storage_key: None,
            status: DocumentStatus::Pending,
            error_message: None,
            tags: Vec::new(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            uploader_user_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Attach the original file name and MIME type.
    #[must_use]
    pub fn with_file(mut self, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Attach the object-storage key of the stored binary.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    /// Attach tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach caller metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this document has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Ingest-time security annotations for a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkSecurity {
    /// Prompt-injection likelihood in `[0, 1]`.
    pub risk_score: f32,
    /// Coarse flags consumed by the retrieval filter.
    pub security_flags: Vec<String>,
    /// Pattern labels that fired during detection.
    pub detected_patterns: Vec<String>,
}

impl ChunkSecurity {
    /// Whether any detector pattern fired.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        !self.security_flags.is_empty()
    }
}

/// A fragment of a document with its embedding.
///
/// The derived full-text vector (`tsv`) is generated by the database and
/// never travels through application code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Denormalized for query scoping.
    pub workspace_id: Uuid,
    /// Contiguous from 0 within the document.
    pub chunk_index: u32,
    pub content: String,
    /// Exactly [`EMBEDDING_DIM`] wide.
    pub embedding: Vec<f32>,
    pub security: ChunkSecurity,
}

impl ChunkRecord {
    /// Create a chunk for `document_id` in `workspace_id`.
    #[must_use]
    pub fn new(
        document_id: Uuid,
        workspace_id: Uuid,
        chunk_index: u32,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            workspace_id,
            chunk_index,
            content: content.into(),
            embedding,
            security: ChunkSecurity::default(),
        }
    }

    /// Attach security annotations.
    #[must_use]
    pub fn with_security(mut self, security: ChunkSecurity) -> Self {
        self.security = security;
        self
    }

    /// Identity used by rank fusion: the chunk id.
    #[must_use]
    pub const fn identity(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Ready,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("BOGUS"), None);
    }

    #[test]
    fn test_document_builder() {
        let ws = Uuid::new_v4();
        let doc = Document::new(ws, "handbook", Uuid::new_v4(), Utc::now())
            .with_file("handbook.pdf", "application/pdf")
            .with_storage_key("ws/doc/handbook.pdf")
            .with_tags(vec!["hr".to_string()]);

        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.mime_type.as_deref(), Some("application/pdf"));
        assert!(!doc.is_deleted());
    }

    #[test]
    fn test_chunk_security_flagged() {
        let mut security = ChunkSecurity::default();
        assert!(!security.is_flagged());
        security.security_flags.push("override_instruction".to_string());
        assert!(security.is_flagged());
    }
}
