//! Request actors and global roles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global role carried by an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    /// Full access to every workspace, including archived reads.
    Admin,
    /// Access governed by ownership, visibility and ACL grants.
    Employee,
}

/// Resolved identity of the request originator.
///
/// Token issuance and user CRUD are external collaborators; the core only
/// ever sees this resolved form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Authenticated user id.
    pub user_id: Uuid,
    /// Global role.
    pub role: GlobalRole,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub const fn new(user_id: Uuid, role: GlobalRole) -> Self {
        Self { user_id, role }
    }

    /// Admin actor shorthand.
    #[must_use]
    pub const fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, GlobalRole::Admin)
    }

    /// Employee actor shorthand.
    #[must_use]
    pub const fn employee(user_id: Uuid) -> Self {
        Self::new(user_id, GlobalRole::Employee)
    }

    /// Whether this actor carries the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == GlobalRole::Admin
    }
}
