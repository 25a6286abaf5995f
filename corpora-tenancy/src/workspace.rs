//! Workspace lifecycle use cases.

use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use corpora_core::traits::{Clock, WorkspaceRepository};
use corpora_core::types::{AuditRecord, Visibility, Workspace};
use corpora_core::{Actor, CorporaError, Result};
use corpora_security::access_control::authorize_workspace;
use corpora_security::{AccessKind, AuditLogger};

/// Create, list, share and archive workspaces.
///
/// Every mutation resolves the policy first and emits an audit event on
/// success; denial and conflict codes flow straight from the policy and
/// repository.
pub struct WorkspaceService {
    workspaces: Arc<dyn WorkspaceRepository>,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WorkspaceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceService").finish_non_exhaustive()
    }
}

impl WorkspaceService {
    /// Create the service.
    #[must_use]
    pub fn new(
        workspaces: Arc<dyn WorkspaceRepository>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workspaces,
            audit,
            clock,
        }
    }

    /// Create a private workspace owned by the actor.
    ///
    /// # Errors
    ///
    /// `Validation` on an empty name, `Conflict` on a duplicate
    /// `(owner, name)` pair.
    pub async fn create(&self, actor: Actor, name: &str) -> Result<Workspace> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CorporaError::validation("workspace name must not be empty"));
        }

        let workspace = Workspace::new(trimmed, actor.user_id, self.clock.now());
        self.workspaces.create(&workspace).await?;

        info!(workspace_id = %workspace.id, owner = %actor.user_id, "workspace created");
        self.audit.emit(
            AuditRecord::new("workspace.created", workspace.created_at)
                .with_workspace(workspace.id)
                .with_actor(actor.user_id)
                .with_payload(json!({"name": trimmed})),
        );
        Ok(workspace)
    }

    /// Fetch a workspace the actor may read.
    ///
    /// # Errors
    ///
    /// `NotFound` for missing or hidden workspaces.
    pub async fn get(&self, actor: Actor, workspace_id: Uuid) -> Result<Workspace> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::Read).await
    }

    /// Workspaces visible to the actor.
    ///
    /// # Errors
    ///
    /// Repository errors only.
    pub async fn list(&self, actor: Actor, include_archived: bool) -> Result<Vec<Workspace>> {
        self.workspaces.list_visible(actor, include_archived).await
    }

    /// Change visibility. Owner or admin only.
    ///
    /// # Errors
    ///
    /// Policy denials; `NotFound` when the row vanished underneath.
    pub async fn update_visibility(
        &self,
        actor: Actor,
        workspace_id: Uuid,
        visibility: Visibility,
    ) -> Result<()> {
        let workspace =
            authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::ManageAcl)
                .await?;

        if !self.workspaces.update_visibility(workspace_id, visibility).await? {
            return Err(CorporaError::not_found("workspace", workspace_id));
        }

        self.audit.emit(
            AuditRecord::new("workspace.visibility_changed", self.clock.now())
                .with_workspace(workspace_id)
                .with_actor(actor.user_id)
                .with_payload(json!({
                    "from": workspace.visibility,
                    "to": visibility,
                })),
        );
        Ok(())
    }

    /// Archive a workspace. Terminal; idempotent calls conflict.
    ///
    /// # Errors
    ///
    /// `Conflict` when already archived; policy denials otherwise.
    pub async fn archive(&self, actor: Actor, workspace_id: Uuid) -> Result<()> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::Write).await?;

        let now = self.clock.now();
        if !self.workspaces.archive(workspace_id, now).await? {
            return Err(CorporaError::conflict(
                "workspace is already archived",
                Some(workspace_id),
            ));
        }

        info!(workspace_id = %workspace_id, "workspace archived");
        self.audit.emit(
            AuditRecord::new("workspace.archived", now)
                .with_workspace(workspace_id)
                .with_actor(actor.user_id),
        );
        Ok(())
    }

    /// Grant read access to `user_id`. Meaningful on `SHARED` workspaces;
    /// grants on other visibilities are stored but dormant.
    ///
    /// # Errors
    ///
    /// Policy denials.
    pub async fn grant(&self, actor: Actor, workspace_id: Uuid, user_id: Uuid) -> Result<()> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::ManageAcl).await?;
        self.workspaces.grant(workspace_id, user_id).await?;

        self.audit.emit(
            AuditRecord::new("acl.granted", self.clock.now())
                .with_workspace(workspace_id)
                .with_actor(actor.user_id)
                .with_payload(json!({"user_id": user_id})),
        );
        Ok(())
    }

    /// Revoke a read grant.
    ///
    /// # Errors
    ///
    /// `NotFound` when no grant existed; policy denials otherwise.
    pub async fn revoke(&self, actor: Actor, workspace_id: Uuid, user_id: Uuid) -> Result<()> {
        authorize_workspace(&self.workspaces, actor, workspace_id, AccessKind::ManageAcl).await?;

        if !self.workspaces.revoke(workspace_id, user_id).await? {
            return Err(CorporaError::not_found("acl grant", user_id));
        }

        self.audit.emit(
            AuditRecord::new("acl.revoked", self.clock.now())
                .with_workspace(workspace_id)
                .with_actor(actor.user_id)
                .with_payload(json!({"user_id": user_id})),
        );
        Ok(())
    }
}
