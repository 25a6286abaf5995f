//! Workspace and ACL persistence.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

use corpora_core::traits::WorkspaceRepository;
use corpora_core::types::{AclAccess, Visibility, Workspace, WorkspaceAcl};
use corpora_core::{Actor, CorporaError, Result};

use crate::postgres::{translate, PostgresBackend};

const WORKSPACE_COLUMNS: &str =
    "id, name, owner_user_id, visibility, archived_at, created_at, updated_at";

/// [`WorkspaceRepository`] over the shared backend.
#[derive(Debug)]
pub struct PgWorkspaceRepository {
    backend: Arc<PostgresBackend>,
}

impl PgWorkspaceRepository {
    /// Create the repository.
    #[must_use]
    pub const fn new(backend: Arc<PostgresBackend>) -> Self {
        Self { backend }
    }
}

fn visibility_as_str(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Private => "PRIVATE",
        Visibility::OrgRead => "ORG_READ",
        Visibility::Shared => "SHARED",
    }
}

fn workspace_from_row(row: &Row) -> Result<Workspace> {
    let visibility_raw: String = row.get("visibility");
    let visibility = match visibility_raw.as_str() {
        "PRIVATE" => Visibility::Private,
        "ORG_READ" => Visibility::OrgRead,
        "SHARED" => Visibility::Shared,
        other => {
            return Err(CorporaError::Database {
                message: format!("unknown workspace visibility '{other}'"),
            })
        }
    };

    Ok(Workspace {
        id: row.get("id"),
        name: row.get("name"),
        owner_user_id: row.get("owner_user_id"),
        visibility,
        archived_at: row.get("archived_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl WorkspaceRepository for PgWorkspaceRepository {
    async fn create(&self, workspace: &Workspace) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO workspaces (id, name, owner_user_id, visibility, archived_at, \
                 created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &workspace.id,
                    &workspace.name,
                    &workspace.owner_user_id,
                    &visibility_as_str(workspace.visibility),
                    &workspace.archived_at,
                    &workspace.created_at,
                    &workspace.updated_at,
                ],
            )
            .await
            .map_err(|e| match translate(&e) {
                CorporaError::Conflict { .. } => CorporaError::conflict(
                    format!("workspace name '{}' already exists for owner", workspace.name),
                    Some(workspace.id),
                ),
                other => other,
            })?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Workspace>> {
        let sql = format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1");
        let client = self.backend.client().await?;
        let row = client
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(|e| translate(&e))?;
        row.as_ref().map(workspace_from_row).transpose()
    }

    async fn list_visible(&self, actor: Actor, include_archived: bool) -> Result<Vec<Workspace>> {
        let sql = format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces w \
             WHERE ( \
                 $1 \
                 OR w.owner_user_id = $2 \
                 OR w.visibility = 'ORG_READ' \
                 OR (w.visibility = 'SHARED' AND EXISTS ( \
                      SELECT 1 FROM workspace_acl a \
                      WHERE a.workspace_id = w.id AND a.user_id = $2)) \
             ) \
             AND (w.archived_at IS NULL \
                  OR ($3 AND ($1 OR w.owner_user_id = $2))) \
             ORDER BY w.created_at DESC \
             LIMIT 100"
        );
        let client = self.backend.client().await?;
        let is_admin = actor.is_admin();
        let rows = client
            .query(sql.as_str(), &[&is_admin, &actor.user_id, &include_archived])
            .await
            .map_err(|e| translate(&e))?;
        rows.iter().map(workspace_from_row).collect()
    }

    async fn update_visibility(&self, id: Uuid, visibility: Visibility) -> Result<bool> {
        let client = self.backend.client().await?;
        let affected = client
            .execute(
                "UPDATE workspaces SET visibility = $2, updated_at = now() WHERE id = $1",
                &[&id, &visibility_as_str(visibility)],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(affected == 1)
    }

    async fn archive(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let client = self.backend.client().await?;
        let affected = client
            .execute(
                "UPDATE workspaces SET archived_at = $2, updated_at = $2 \
                 WHERE id = $1 AND archived_at IS NULL",
                &[&id, &at],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(affected == 1)
    }

    async fn find_acl(&self, workspace_id: Uuid) -> Result<Vec<WorkspaceAcl>> {
        let client = self.backend.client().await?;
        let rows = client
            .query(
                "SELECT workspace_id, user_id FROM workspace_acl WHERE workspace_id = $1",
                &[&workspace_id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(rows
            .iter()
            .map(|row| WorkspaceAcl {
                workspace_id: row.get("workspace_id"),
                user_id: row.get("user_id"),
                access: AclAccess::Read,
            })
            .collect())
    }

    async fn grant(&self, workspace_id: Uuid, user_id: Uuid) -> Result<()> {
        let client = self.backend.client().await?;
        client
            .execute(
                "INSERT INTO workspace_acl (workspace_id, user_id, access) \
                 VALUES ($1, $2, 'READ') ON CONFLICT DO NOTHING",
                &[&workspace_id, &user_id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(())
    }

    async fn revoke(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool> {
        let client = self.backend.client().await?;
        let affected = client
            .execute(
                "DELETE FROM workspace_acl WHERE workspace_id = $1 AND user_id = $2",
                &[&workspace_id, &user_id],
            )
            .await
            .map_err(|e| translate(&e))?;
        Ok(affected == 1)
    }
}
