//! Workspace and ACL entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workspace access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Owner (and admins) only.
    Private,
    /// Readable by every employee.
    OrgRead,
    /// Readable by employees granted in the ACL.
    Shared,
}

/// Access level of an ACL grant. Only read grants exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclAccess {
    Read,
}

/// An isolated document container owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    /// Unique per owner.
    pub name: String,
    pub owner_user_id: Uuid,
    pub visibility: Visibility,
    /// Terminal soft state: hides the workspace from default listings and
    /// rejects writes and document queries.
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// Create a new private workspace.
    #[must_use]
    pub fn new(name: impl Into<String>, owner_user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            owner_user_id,
            visibility: Visibility::Private,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the workspace has been archived.
    #[must_use]
    pub const fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Per-user read grant on a `Shared` workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceAcl {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub access: AclAccess,
}

impl WorkspaceAcl {
    /// Read grant for `user_id` on `workspace_id`.
    #[must_use]
    pub const fn read(workspace_id: Uuid, user_id: Uuid) -> Self {
        Self {
            workspace_id,
            user_id,
            access: AclAccess::Read,
        }
    }
}
