//! Job queue port.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A claimed unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Job kind, e.g. `ingest_document`.
    pub name: String,
    /// Idempotency key: the document being processed.
    pub document_id: Uuid,
    /// 1-based attempt counter including this claim.
    pub attempt: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    /// Whether this claim is the final permitted attempt.
    #[must_use]
    pub const fn last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// At-least-once delivery queue with visibility timeouts.
///
/// Unacked jobs return to the claimable pool once their lease expires;
/// `nack` returns a job early and burns one attempt.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job keyed on `document_id` with a retry budget.
    async fn enqueue(&self, name: &str, document_id: Uuid, max_attempts: u32) -> Result<Uuid>;

    /// Claim the next available job, leasing it for `visibility`.
    async fn claim(&self, visibility: Duration) -> Result<Option<Job>>;

    /// Acknowledge successful (or terminally failed) handling.
    async fn ack(&self, job_id: Uuid) -> Result<()>;

    /// Return a job to the queue, or bury it when attempts are exhausted.
    async fn nack(&self, job_id: Uuid) -> Result<()>;
}
