//! Document and chunk persistence over PostgreSQL + pgvector.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use tokio_postgres::Row;
use uuid::Uuid;

use corpora_core::traits::repository::{
    DocumentFilter, DocumentRepository, ScoredChunk, LIST_LIMIT_MAX,
};
use corpora_core::types::{
    ChunkRecord, ChunkSecurity, Document, DocumentStatus, EMBEDDING_DIM,
};
use corpora_core::{CorporaError, Result};

use crate::postgres::{translate, PostgresBackend};

const DOCUMENT_COLUMNS: &str = "id, workspace_id, title, source, file_name, mime_type, \
     storage_key, status, error_message, tags, metadata, uploader_user_id, \
     created_at, updated_at, deleted_at";

const CHUNK_COLUMNS: &str = "c.id, c.document_id, c.workspace_id, c.chunk_index, c.content, \
     c.embedding, c.risk_score, c.security_flags, c.detected_patterns, d.title AS document_title";

/// [`DocumentRepository`] over the shared backend.
#[derive(Debug)]
pub struct PgDocumentRepository {
    backend: Arc<PostgresBackend>,
}

impl PgDocumentRepository {
    /// Create the repository.
    #[must_use]
    pub const fn new(backend: Arc<PostgresBackend>) -> Self {
        Self { backend }
    }
}

fn document_from_row(row: &Row) -> Result<Document> {
    let status_raw: String = row.get("status");
    let status = DocumentStatus::parse(&status_raw).ok_or_else(|| CorporaError::Database {
        message: format!("unknown document status '{status_raw}'"),
    })?;

    Ok(Document {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        title: row.get("title"),
        source: row.get("source"),
        file_name: row.get("file_name"),
        mime_type: row.get("mime_type"),
        storage_key: row.get("storage_key"),
        status,
        error_message: row.get("error_message"),
        tags: row.get("tags"),
        metadata: row.get("metadata"),
        uploader_user_id: row.get("uploader_user_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    })
}

fn scored_chunk_from_row(row: &Row) -> Result<ScoredChunk> {
    let vector: Vector = row.get("embedding");
    let embedding = vector.to_vec();
    if embedding.len() != EMBEDDING_DIM {
        return Err(CorporaError::Database {
            message: format!(
                "stored embedding has dimension {} instead of {EMBEDDING_DIM}",
                embedding.len()
            ),
        });
    }

    let chunk_index: i32 = row.get("chunk_index");
    Ok(ScoredChunk {
        chunk: ChunkRecord {
            id: row.get("id"),
            document_id: row.get("document_id"),
            workspace_id: row.get("workspace_id"),
            chunk_index: u32::try_from(chunk_index).unwrap_or_default(),
            content: row.get("content"),
            embedding,
            security: ChunkSecurity {
                risk_score: row.get("risk_score"),
                security_flags: row.get("security_flags"),
                detected_patterns: row.get("detected_patterns"),
            },
        },
        score: row.get("score"),
        document_title: row.get("document_title"),
    })
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn create(&self, document: &Document) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO documents (id, workspace_id, title, source, file_name, mime_type, \
                 storage_key, status, error_message, tags, metadata, uploader_user_id, \
                 created_at, updated_at, deleted_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                &[
                    &document.id,
                    &document.workspace_id,
                    &document.title,
                    &document.source,
                    &document.file_name,
                    &document.mime_type,
                    &document.storage_key,
                    &document.status.as_str(),
                    &document.error_message,
                    &document.tags,
                    &document.metadata,
                    &document.uploader_user_id,
                    &document.created_at,
                    &document.updated_at,
                    &document.deleted_at,
                ],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn get(&self, workspace_id: Uuid, id: Uuid) -> Result<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE workspace_id = $1 AND id = $2 AND deleted_at IS NULL"
        );
        let client = self.backend.client().await?;
        let row = client
            .query_opt(sql.as_str(), &[&workspace_id, &id])
            .await
            .map_err(|e| translate(&e))?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn get_any(&self, id: Uuid) -> Result<Option<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        let client = self.backend.client().await?;
        let row = client
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(|e| translate(&e))?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn list(
        &self,
        workspace_id: Uuid,
        filter: &DocumentFilter,
        cursor: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Document>> {
        let capped = i64::from(limit.clamp(1, LIST_LIMIT_MAX));
        let status = filter.status.map(DocumentStatus::as_str);

        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE workspace_id = $1 AND deleted_at IS NULL \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::text IS NULL OR $3 = ANY(tags)) \
               AND ($4::timestamptz IS NULL OR created_at < $4) \
             ORDER BY created_at DESC \
             LIMIT $5"
        );
        let client = self.backend.client().await?;
        let rows = client
            .query(
                sql.as_str(),
                &[&workspace_id, &status, &filter.tag, &cursor, &capped],
            )
            .await
            .map_err(|e| translate(&e))?;
        rows.iter().map(document_from_row).collect()
    }

    async fn soft_delete(&self, workspace_id: Uuid, id: Uuid) -> Result<bool> {
        let client = self.backend.client().await?;
        let affected = client
            .execute(
                "UPDATE documents SET deleted_at = now(), updated_at = now() \
                 WHERE workspace_id = $1 AND id = $2 AND deleted_at IS NULL",
                &[&workspace_id, &id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(affected == 1)
    }

    async fn update_metadata(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        title: Option<String>,
        tags: Option<Vec<String>>,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool> {
        let client = self.backend.client().await?;
        let affected = client
            .execute(
                "UPDATE documents SET \
                     title = COALESCE($3, title), \
                     tags = COALESCE($4, tags), \
                     metadata = COALESCE($5, metadata), \
                     updated_at = now() \
                 WHERE workspace_id = $1 AND id = $2 AND deleted_at IS NULL",
                &[&workspace_id, &id, &title, &tags, &metadata],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(affected == 1)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<bool> {
        let client = self.backend.client().await?;
        let affected = client
            .execute(
                "UPDATE documents SET status = $3, updated_at = now() \
                 WHERE id = $1 AND status = $2",
                &[&id, &from.as_str(), &to.as_str()],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(affected == 1)
    }

    async fn set_failed(&self, id: Uuid, message: &str) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "UPDATE documents SET status = 'FAILED', error_message = $2, updated_at = now() \
                 WHERE id = $1",
                &[&id, &message],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn reset_for_reprocess(&self, id: Uuid) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "UPDATE documents SET status = 'PENDING', error_message = NULL, \
                 updated_at = now() WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn save_document_with_chunks(
        &self,
        document: &Document,
        chunks: &[ChunkRecord],
    ) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != EMBEDDING_DIM {
                return Err(CorporaError::validation(format!(
                    "chunk {} has embedding dimension {} instead of {EMBEDDING_DIM}",
                    chunk.chunk_index,
                    chunk.embedding.len()
                )));
            }
        }

        let mut client = self.backend.client().await?;
        let tx = client.transaction().await.map_err(|e| translate(&e))?;

        tx.execute("DELETE FROM chunks WHERE document_id = $1", &[&document.id])
            .await
            .map_err(|e| translate(&e))?;

        let insert = tx
            .prepare(
                "INSERT INTO chunks (id, document_id, workspace_id, chunk_index, content, \
                 embedding, risk_score, security_flags, detected_patterns) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .await
            .map_err(|e| translate(&e))?;

        for chunk in chunks {
            let index = i32::try_from(chunk.chunk_index).map_err(|_| {
                CorporaError::validation("chunk index exceeds storage range")
            })?;
            tx.execute(
                &insert,
                &[
                    &chunk.id,
                    &chunk.document_id,
                    &chunk.workspace_id,
                    &index,
                    &chunk.content,
                    &Vector::from(chunk.embedding.clone()),
                    &chunk.security.risk_score,
                    &chunk.security.security_flags,
                    &chunk.security.detected_patterns,
                ],
            )
            .await
            .map_err(|e| translate(&e))?;
        }

        tx.execute(
            "UPDATE documents SET title = $2, source = $3, file_name = $4, mime_type = $5, \
             storage_key = $6, status = $7, error_message = $8, tags = $9, metadata = $10, \
             updated_at = $11 WHERE id = $1",
            &[
                &document.id,
                &document.title,
                &document.source,
                &document.file_name,
                &document.mime_type,
                &document.storage_key,
                &document.status.as_str(),
                &document.error_message,
                &document.tags,
                &document.metadata,
                &document.updated_at,
            ],
        )
        .await
        .map_err(|e| translate(&e))?;

        tx.commit().await.map_err(|e| translate(&e))
    }

    async fn find_chunks_similar(
        &self,
        workspace_id: Uuid,
        embedding: &[f32],
        k: u32,
    ) -> Result<Vec<ScoredChunk>> {
        if embedding.len() != EMBEDDING_DIM {
            return Err(CorporaError::validation(format!(
                "query embedding has dimension {} instead of {EMBEDDING_DIM}",
                embedding.len()
            )));
        }

        let capped = i64::from(k.clamp(1, LIST_LIMIT_MAX));
        let query_vector = Vector::from(embedding.to_vec());
        let sql = format!(
            "SELECT {CHUNK_COLUMNS}, \
                    (1 - (c.embedding <=> $2))::real AS score \
             FROM chunks c \
             JOIN documents d ON d.id = c.document_id \
             WHERE c.workspace_id = $1 AND d.deleted_at IS NULL \
             ORDER BY c.embedding <=> $2 \
             LIMIT $3"
        );
        let client = self.backend.client().await?;
        let rows = client
            .query(sql.as_str(), &[&workspace_id, &query_vector, &capped])
            .await
            .map_err(|e| translate(&e))?;
        rows.iter().map(scored_chunk_from_row).collect()
    }

    async fn find_chunks_full_text(
        &self,
        workspace_id: Uuid,
        query: &str,
        k: u32,
    ) -> Result<Vec<ScoredChunk>> {
        let capped = i64::from(k.clamp(1, LIST_LIMIT_MAX));
        let regconfig = self.backend.text_search_config();
        let sql = format!(
            "SELECT {CHUNK_COLUMNS}, \
                    ts_rank(c.tsv, websearch_to_tsquery($3::regconfig, $2))::real AS score \
             FROM chunks c \
             JOIN documents d ON d.id = c.document_id \
             WHERE c.workspace_id = $1 AND d.deleted_at IS NULL \
               AND c.tsv @@ websearch_to_tsquery($3::regconfig, $2) \
             ORDER BY score DESC \
             LIMIT $4"
        );
        let client = self.backend.client().await?;
        let rows = client
            .query(sql.as_str(), &[&workspace_id, &query, &regconfig, &capped])
            .await
            .map_err(|e| translate(&e))?;
        rows.iter().map(scored_chunk_from_row).collect()
    }

    async fn chunk_count(&self, document_id: Uuid) -> Result<u64> {
        let client = self.backend.client().await?;
        let row = client
            .query_one(
                "SELECT count(*) FROM chunks WHERE document_id = $1",
                &[&document_id],
            )
            .await
            .map_err(|e| translate(&e))?;
        let count: i64 = row.get(0);
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
