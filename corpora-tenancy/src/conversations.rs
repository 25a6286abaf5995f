//! Conversation management use cases.

use std::sync::Arc;

use uuid::Uuid;

use corpora_core::traits::{Clock, ConversationRepository, WorkspaceRepository};
use corpora_core::types::{Conversation, Message};
use corpora_core::{Actor, CorporaError, Result};
use corpora_security::access_control::authorize_workspace;
use corpora_security::AccessKind;

/// Create conversations and read/clear their history.
///
/// Messages are appended by the answer pipeline; this service only owns
/// the container.
pub struct ConversationService {
    workspaces: Arc<dyn WorkspaceRepository>,
    conversations: Arc<dyn ConversationRepository>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ConversationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationService").finish_non_exhaustive()
    }
}

impl ConversationService {
    /// Create the service.
    #[must_use]
    pub fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        conversations: Arc<dyn ConversationRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workspaces,
            conversations,
            clock,
        }
    }

    /// Open a conversation in a workspace the actor may read.
    ///
    /// # Errors
    ///
    /// Policy denials and repository errors.
    pub async fn create(&self, actor: Actor, workspace_id: Uuid) -> Result<Conversation> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::Read).await?;

        let conversation = Conversation::new(workspace_id, actor.user_id, self.clock.now());
        self.conversations.create(&conversation).await?;
        Ok(conversation)
    }

    /// Read history, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` unless the actor owns the conversation (or is admin).
    pub async fn get_messages(
        &self,
        actor: Actor,
        conversation_id: Uuid,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.owned(actor, conversation_id).await?;
        self.conversations.get_messages(conversation_id, limit).await
    }

    /// Delete every message, keeping the conversation.
    ///
    /// # Errors
    ///
    /// `NotFound` unless the actor owns the conversation (or is admin).
    pub async fn clear(&self, actor: Actor, conversation_id: Uuid) -> Result<()> {
        self.owned(actor, conversation_id).await?;
        self.conversations.clear(conversation_id).await
    }

    async fn owned(&self, actor: Actor, conversation_id: Uuid) -> Result<Conversation> {
        self.conversations
            .get(conversation_id)
            .await?
            .filter(|c| c.owner_user_id == actor.user_id || actor.is_admin())
            .ok_or(CorporaError::not_found("conversation", conversation_id))
    }
}
