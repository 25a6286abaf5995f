//! Feedback votes on assistant messages.

use std::sync::Arc;

use uuid::Uuid;

use corpora_core::traits::FeedbackRepository;
use corpora_core::types::FeedbackVote;
use corpora_core::{Actor, CorporaError, Result};

/// Record thumbs-up/down style votes, one per `(message, user)`.
pub struct FeedbackService {
    feedback: Arc<dyn FeedbackRepository>,
}

impl std::fmt::Debug for FeedbackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackService").finish_non_exhaustive()
    }
}

impl FeedbackService {
    /// Create the service.
    #[must_use]
    pub fn new(feedback: Arc<dyn FeedbackRepository>) -> Self {
        Self { feedback }
    }

    /// Cast or replace the actor's vote on a message.
    ///
    /// # Errors
    ///
    /// `Validation` for values outside `{-1, 0, 1}`.
    pub async fn vote(&self, actor: Actor, message_id: Uuid, value: i16) -> Result<FeedbackVote> {
        if !(-1..=1).contains(&value) {
            return Err(CorporaError::validation(
                "feedback value must be -1, 0 or 1",
            ));
        }

        let vote = FeedbackVote::new(message_id, actor.user_id, value);
        self.feedback.upsert_vote(&vote).await?;
        Ok(vote)
    }

    /// The actor's current vote on a message, if any.
    ///
    /// # Errors
    ///
    /// Repository errors only.
    pub async fn get(&self, actor: Actor, message_id: Uuid) -> Result<Option<FeedbackVote>> {
        self.feedback.get_vote(message_id, actor.user_id).await
    }
}
