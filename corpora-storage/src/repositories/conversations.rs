//! Conversation and message persistence.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::Row;
use uuid::Uuid;

use corpora_core::traits::repository::{ConversationRepository, LIST_LIMIT_MAX};
use corpora_core::types::{Conversation, Message, MessageRole};
use corpora_core::{CorporaError, Result};

use crate::postgres::{translate, PostgresBackend};

/// [`ConversationRepository`] over the shared backend.
#[derive(Debug)]
pub struct PgConversationRepository {
    backend: Arc<PostgresBackend>,
}

impl PgConversationRepository {
    /// Create the repository.
    #[must_use]
    pub const fn new(backend: Arc<PostgresBackend>) -> Self {
        Self { backend }
    }
}

fn message_from_row(row: &Row) -> Result<Message> {
    let role_raw: String = row.get("role");
    let role = MessageRole::parse(&role_raw).ok_or_else(|| CorporaError::Database {
        message: format!("unknown message role '{role_raw}'"),
    })?;
    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        role,
        content: row.get("content"),
        created_at: row.get("created_at"),
        sources_snapshot: row.get("sources_snapshot"),
    })
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn create(&self, conversation: &Conversation) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO conversations (id, workspace_id, owner_user_id, created_at) \
                 VALUES ($1, $2, $3, $4)",
                &[
                    &conversation.id,
                    &conversation.workspace_id,
                    &conversation.owner_user_id,
                    &conversation.created_at,
                ],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        let client = self.backend.client().await?;
        let row = client
            .query_opt(
                "SELECT id, workspace_id, owner_user_id, created_at \
                 FROM conversations WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(row.map(|row| Conversation {
            id: row.get("id"),
            workspace_id: row.get("workspace_id"),
            owner_user_id: row.get("owner_user_id"),
            created_at: row.get("created_at"),
        }))
    }

    async fn append_message(&self, message: &Message) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO messages (id, conversation_id, role, content, created_at, \
                 sources_snapshot) VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &message.id,
                    &message.conversation_id,
                    &message.role.as_str(),
                    &message.content,
                    &message.created_at,
                    &message.sources_snapshot,
                ],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn get_messages(&self, conversation_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        let capped = i64::from(limit.clamp(1, LIST_LIMIT_MAX));
        let client = self.backend.client().await?;
        // Fetch the newest `limit`, then flip to chronological order.
        let rows = client
            .query(
                "SELECT id, conversation_id, role, content, created_at, sources_snapshot \
                 FROM (SELECT * FROM messages WHERE conversation_id = $1 \
                       ORDER BY created_at DESC LIMIT $2) latest \
                 ORDER BY created_at ASC",
                &[&conversation_id, &capped],
            )
            .await
            .map_err(|e| translate(&e))?;
        rows.iter().map(message_from_row).collect()
    }

    async fn clear(&self, conversation_id: Uuid) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "DELETE FROM messages WHERE conversation_id = $1",
                &[&conversation_id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }
}
