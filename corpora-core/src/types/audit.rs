//! Audit trail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single audit trail entry.
///
/// Kinds are dotted lowercase strings (`workspace.created`,
/// `access.denied`, `document.ingested`, ...); payloads are small JSON
/// objects and never contain document content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub actor_user_id: Option<Uuid>,
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a record with an empty payload.
    #[must_use]
    pub fn new(kind: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id: None,
            actor_user_id: None,
            kind: kind.into(),
            payload: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
        }
    }

    /// Scope the record to a workspace.
    #[must_use]
    pub const fn with_workspace(mut self, workspace_id: Uuid) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    /// Record the acting user.
    #[must_use]
    pub const fn with_actor(mut self, actor_user_id: Uuid) -> Self {
        self.actor_user_id = Some(actor_user_id);
        self
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let ws = Uuid::new_v4();
        let user = Uuid::new_v4();
        let record = AuditRecord::new("workspace.created", Utc::now())
            .with_workspace(ws)
            .with_actor(user)
            .with_payload(serde_json::json!({"name": "notes"}));

        assert_eq!(record.workspace_id, Some(ws));
        assert_eq!(record.actor_user_id, Some(user));
        assert_eq!(record.payload["name"], "notes");
    }
}
