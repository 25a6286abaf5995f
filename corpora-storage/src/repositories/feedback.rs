//! Feedback vote persistence.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use corpora_core::traits::FeedbackRepository;
use corpora_core::types::FeedbackVote;
use corpora_core::Result;

use crate::postgres::{translate, PostgresBackend};

/// [`FeedbackRepository`] over the shared backend.
#[derive(Debug)]
pub struct PgFeedbackRepository {
    backend: Arc<PostgresBackend>,
}

impl PgFeedbackRepository {
    /// Create the repository.
    #[must_use]
    pub const fn new(backend: Arc<PostgresBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl FeedbackRepository for PgFeedbackRepository {
    async fn upsert_vote(&self, vote: &FeedbackVote) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO feedback_votes (message_id, user_id, value) VALUES ($1, $2, $3) \
                 ON CONFLICT (message_id, user_id) DO UPDATE SET value = EXCLUDED.value",
                &[&vote.message_id, &vote.user_id, &vote.value],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn get_vote(&self, message_id: Uuid, user_id: Uuid) -> Result<Option<FeedbackVote>> {
        let client = self.backend.client().await?;
        let row = client
            .query_opt(
                "SELECT message_id, user_id, value FROM feedback_votes \
                 WHERE message_id = $1 AND user_id = $2",
                &[&message_id, &user_id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(row.map(|row| FeedbackVote {
            message_id: row.get("message_id"),
            user_id: row.get("user_id"),
            value: row.get("value"),
        }))
    }
}
