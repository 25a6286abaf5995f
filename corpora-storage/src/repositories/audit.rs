//! Audit trail persistence.

use std::sync::Arc;

use async_trait::async_trait;

use corpora_core::traits::AuditRepository;
use corpora_core::types::AuditRecord;
use corpora_core::Result;

use crate::postgres::{translate, PostgresBackend};

/// Append-only [`AuditRepository`] over the shared backend.
#[derive(Debug)]
pub struct PgAuditRepository {
    backend: Arc<PostgresBackend>,
}

impl PgAuditRepository {
    /// Create the repository.
    #[must_use]
    pub const fn new(backend: Arc<PostgresBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO audit_events (id, workspace_id, actor_user_id, kind, payload, \
                 created_at) VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &record.id,
                    &record.workspace_id,
                    &record.actor_user_id,
                    &record.kind,
                    &record.payload,
                    &record.created_at,
                ],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }
}
