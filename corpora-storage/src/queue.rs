//! PostgreSQL-backed job queue with visibility timeouts.
//!
//! `claim` uses `FOR UPDATE SKIP LOCKED` so concurrent workers never fight
//! over a job; a claimed job whose lease (`locked_until`) expires becomes
//! claimable again, which is the crash-recovery path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use corpora_core::traits::{Job, JobQueue};
use corpora_core::{CorporaError, Result};

use crate::postgres::{translate, PostgresBackend};

/// [`JobQueue`] over the shared backend.
#[derive(Debug)]
pub struct PgJobQueue {
    backend: Arc<PostgresBackend>,
}

impl PgJobQueue {
    /// Create the queue.
    #[must_use]
    pub const fn new(backend: Arc<PostgresBackend>) -> Self {
        Self { backend }
    }

    /// Jobs buried after exhausting their attempts, newest first. An
    /// operator surface; the worker never reads these.
    ///
    /// # Errors
    ///
    /// `Database` on connection trouble.
    pub async fn dead_jobs(&self, limit: u32) -> Result<Vec<Job>> {
        let capped = i64::from(limit.clamp(1, 100));
        let client = self.backend.client().await?;
        let rows = client
            .query(
                "SELECT id, name, document_id, attempts, max_attempts, enqueued_at \
                 FROM jobs WHERE status = 'dead' ORDER BY enqueued_at DESC LIMIT $1",
                &[&capped],
            )
            .await
            .map_err(|e| translate(&e))?;
        rows.iter().map(job_from_row).collect()
    }
}

fn job_from_row(row: &tokio_postgres::Row) -> Result<Job> {
    let attempts: i32 = row.get("attempts");
    let max_attempts: i32 = row.get("max_attempts");
    Ok(Job {
        id: row.get("id"),
        name: row.get("name"),
        document_id: row.get("document_id"),
        attempt: u32::try_from(attempts).unwrap_or_default(),
        max_attempts: u32::try_from(max_attempts).unwrap_or(1),
        enqueued_at: row.get("enqueued_at"),
    })
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, name: &str, document_id: Uuid, max_attempts: u32) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let budget = i32::try_from(max_attempts.max(1))
            .map_err(|_| CorporaError::validation("retry budget out of range"))?;
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO jobs (id, name, document_id, status, attempts, max_attempts, \
                 enqueued_at) VALUES ($1, $2, $3, 'queued', 0, $4, now())",
                &[&id, &name, &document_id, &budget],
            )
            .await
            .map_err(|e| translate(&e))?;
        debug!(job_id = %id, document_id = %document_id, name, "job enqueued");
        Ok(id)
    }

    async fn claim(&self, visibility: Duration) -> Result<Option<Job>> {
        let lease_secs = visibility.as_secs_f64();
        let client = self.backend.client().await?;
        let row = client
            .query_opt(
                "WITH next AS ( \
                     SELECT id FROM jobs \
                     WHERE status = 'queued' \
                        OR (status = 'claimed' AND locked_until < now()) \
                     ORDER BY enqueued_at \
                     LIMIT 1 \
                     FOR UPDATE SKIP LOCKED \
                 ) \
                 UPDATE jobs j \
                 SET status = 'claimed', \
                     attempts = j.attempts + 1, \
                     locked_until = now() + make_interval(secs => $1) \
                 FROM next WHERE j.id = next.id \
                 RETURNING j.id, j.name, j.document_id, j.attempts, j.max_attempts, \
                           j.enqueued_at",
                &[&lease_secs],
            )
            .await
            .map_err(|e| translate(&e))?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn ack(&self, job_id: Uuid) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute("DELETE FROM jobs WHERE id = $1", &[&job_id])
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn nack(&self, job_id: Uuid) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "UPDATE jobs SET \
                     status = CASE WHEN attempts >= max_attempts THEN 'dead' ELSE 'queued' END, \
                     locked_until = NULL \
                 WHERE id = $1",
                &[&job_id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }
}
