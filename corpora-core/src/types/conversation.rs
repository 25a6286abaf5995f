//! Conversations, messages and feedback votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message author within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse the database representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A query/answer thread scoped to one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation.
    #[must_use]
    pub fn new(workspace_id: Uuid, owner_user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            owner_user_id,
            created_at: now,
        }
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Citations as shown to the user at answer time, frozen for history.
    pub sources_snapshot: serde_json::Value,
}

impl Message {
    /// Create a message with an empty sources snapshot.
    #[must_use]
    pub fn new(
        conversation_id: Uuid,
        role: MessageRole,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.into(),
            created_at: now,
            sources_snapshot: serde_json::Value::Array(Vec::new()),
        }
    }

    /// Attach the frozen citation list.
    #[must_use]
    pub fn with_sources(mut self, sources_snapshot: serde_json::Value) -> Self {
        self.sources_snapshot = sources_snapshot;
        self
    }
}

/// Per-user vote on an assistant message. Unique per `(message, user)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackVote {
    pub message_id: Uuid,
    pub user_id: Uuid,
    /// `-1`, `0` or `1`.
    pub value: i16,
}

impl FeedbackVote {
    /// Create a vote; values outside `{-1, 0, 1}` are rejected by the
    /// feedback service before reaching storage.
    #[must_use]
    pub const fn new(message_id: Uuid, user_id: Uuid, value: i16) -> Self {
        Self {
            message_id,
            user_id,
            value,
        }
    }
}
