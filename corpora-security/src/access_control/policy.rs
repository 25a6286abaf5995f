//! Workspace access decisions.
//!
//! Single authority for who may read, write or manage a workspace. Every
//! use case resolves a capability here before touching a repository; no
//! other code inspects visibility or ACL rows.

use std::sync::Arc;

use tracing::debug;

use corpora_core::traits::WorkspaceRepository;
use corpora_core::types::{Visibility, Workspace, WorkspaceAcl};
use corpora_core::{Actor, CorporaError, Result};

/// Operation class being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    ManageAcl,
}

impl AccessKind {
    /// Label used in audit payloads and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ManageAcl => "manage_acl",
        }
    }
}

/// Stateless resolver for the workspace decision table.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspacePolicy;

impl WorkspacePolicy {
    /// Authorize `kind` for `actor` on `workspace` given its ACL rows.
    ///
    /// Denials on workspaces the actor cannot see at all surface as
    /// `NotFound` so existence is never revealed; denials on visible
    /// workspaces surface as `Forbidden`.
    ///
    /// # Errors
    ///
    /// `Forbidden` or `NotFound` per the decision table.
    pub fn resolve(
        actor: Actor,
        workspace: &Workspace,
        acl: &[WorkspaceAcl],
        kind: AccessKind,
    ) -> Result<()> {
        let decision = Self::evaluate(actor, workspace, acl, kind);
        if let Err(error) = &decision {
            debug!(
                workspace_id = %workspace.id,
                user_id = %actor.user_id,
                access = kind.as_str(),
                code = error.code().as_str(),
                "workspace access denied"
            );
        }
        decision
    }

    fn evaluate(
        actor: Actor,
        workspace: &Workspace,
        acl: &[WorkspaceAcl],
        kind: AccessKind,
    ) -> Result<()> {
        let is_owner = workspace.owner_user_id == actor.user_id;

        if actor.is_admin() {
            // Admins read everything, archived included, for audit.
            if kind == AccessKind::Read {
                return Ok(());
            }
            if workspace.is_archived() {
                return Err(CorporaError::forbidden("workspace is archived"));
            }
            return Ok(());
        }

        if is_owner {
            // Owners keep read access to archived workspaces; document
            // queries on them are rejected separately by the pipelines.
            if kind == AccessKind::Read {
                return Ok(());
            }
            if workspace.is_archived() {
                return Err(CorporaError::forbidden("workspace is archived"));
            }
            return Ok(());
        }

        // Plain employees never write or manage grants.
        let readable = match workspace.visibility {
            Visibility::OrgRead => true,
            Visibility::Shared => acl.iter().any(|row| row.user_id == actor.user_id),
            Visibility::Private => false,
        };

        if !readable {
            return Err(CorporaError::not_found("workspace", workspace.id));
        }
        if workspace.is_archived() {
            // Archival hides the workspace from everyone but owner and admin.
            return Err(CorporaError::not_found("workspace", workspace.id));
        }
        if kind == AccessKind::Read {
            Ok(())
        } else {
            Err(CorporaError::forbidden(
                "write access requires ownership or the admin role",
            ))
        }
    }
}

/// Load `workspace_id` and authorize `kind` in one step.
///
/// The single resolution path shared by every use case, streaming
/// pipelines included: repository lookup, ACL fetch, policy decision. A
/// missing workspace and a masked denial are indistinguishable to the
/// caller.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, or repository errors.
pub async fn authorize_workspace(
    workspaces: &Arc<dyn WorkspaceRepository>,
    actor: Actor,
    workspace_id: uuid::Uuid,
    kind: AccessKind,
) -> Result<Workspace> {
    let workspace = workspaces
        .get(workspace_id)
        .await?
        .ok_or(CorporaError::not_found("workspace", workspace_id))?;
    let acl = workspaces.find_acl(workspace_id).await?;
    WorkspacePolicy::resolve(actor, &workspace, &acl, kind)?;
    Ok(workspace)
}
