//! Workspace lifecycle integration tests over in-memory repositories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use corpora_core::traits::{
    AuditRepository, Clock, FeedbackRepository, WorkspaceRepository,
};
use corpora_core::types::{
    AuditRecord, FeedbackVote, Visibility, Workspace, WorkspaceAcl,
};
use corpora_core::{Actor, CorporaError, ErrorCode, Result};
use corpora_security::AuditLogger;
use corpora_tenancy::{FeedbackService, WorkspaceService};

#[derive(Debug, Clone, Copy)]
struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Default)]
struct MemWorkspaces {
    workspaces: Mutex<HashMap<Uuid, Workspace>>,
    acl: Mutex<Vec<WorkspaceAcl>>,
}

#[async_trait]
impl WorkspaceRepository for MemWorkspaces {
    async fn create(&self, workspace: &Workspace) -> Result<()> {
        let mut map = self.workspaces.lock();
        if map.values().any(|existing| {
            existing.owner_user_id == workspace.owner_user_id && existing.name == workspace.name
        }) {
            return Err(CorporaError::conflict(
                "workspace name already exists",
                Some(workspace.id),
            ));
        }
        map.insert(workspace.id, workspace.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Workspace>> {
        Ok(self.workspaces.lock().get(&id).cloned())
    }

    async fn list_visible(&self, actor: Actor, include_archived: bool) -> Result<Vec<Workspace>> {
        let acl = self.acl.lock();
        Ok(self
            .workspaces
            .lock()
            .values()
            .filter(|ws| {
                let visible = actor.is_admin()
                    || ws.owner_user_id == actor.user_id
                    || ws.visibility == Visibility::OrgRead
                    || (ws.visibility == Visibility::Shared
                        && acl
                            .iter()
                            .any(|row| row.workspace_id == ws.id && row.user_id == actor.user_id));
                let archived_ok = ws.archived_at.is_none() || include_archived;
                visible && archived_ok
            })
            .cloned()
            .collect())
    }

    async fn update_visibility(&self, id: Uuid, visibility: Visibility) -> Result<bool> {
        Ok(self
            .workspaces
            .lock()
            .get_mut(&id)
            .map(|ws| ws.visibility = visibility)
            .is_some())
    }

    async fn archive(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut map = self.workspaces.lock();
        match map.get_mut(&id) {
            Some(ws) if ws.archived_at.is_none() => {
                ws.archived_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_acl(&self, workspace_id: Uuid) -> Result<Vec<WorkspaceAcl>> {
        Ok(self
            .acl
            .lock()
            .iter()
            .filter(|row| row.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn grant(&self, workspace_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut acl = self.acl.lock();
        if !acl
            .iter()
            .any(|row| row.workspace_id == workspace_id && row.user_id == user_id)
        {
            acl.push(WorkspaceAcl::read(workspace_id, user_id));
        }
        Ok(())
    }

    async fn revoke(&self, workspace_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut acl = self.acl.lock();
        let before = acl.len();
        acl.retain(|row| !(row.workspace_id == workspace_id && row.user_id == user_id));
        Ok(acl.len() < before)
    }
}

#[derive(Debug, Default)]
struct MemAudit {
    records: Mutex<Vec<AuditRecord>>,
}

#[async_trait]
impl AuditRepository for MemAudit {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemFeedback {
    votes: Mutex<Vec<FeedbackVote>>,
}

#[async_trait]
impl FeedbackRepository for MemFeedback {
    async fn upsert_vote(&self, vote: &FeedbackVote) -> Result<()> {
        let mut votes = self.votes.lock();
        votes.retain(|existing| {
            !(existing.message_id == vote.message_id && existing.user_id == vote.user_id)
        });
        votes.push(*vote);
        Ok(())
    }

    async fn get_vote(&self, message_id: Uuid, user_id: Uuid) -> Result<Option<FeedbackVote>> {
        Ok(self
            .votes
            .lock()
            .iter()
            .find(|vote| vote.message_id == message_id && vote.user_id == user_id)
            .copied())
    }
}

fn service() -> (WorkspaceService, Arc<MemWorkspaces>, Arc<MemAudit>) {
    let workspaces = Arc::new(MemWorkspaces::default());
    let audit_sink = Arc::new(MemAudit::default());
    let service = WorkspaceService::new(
        workspaces.clone(),
        AuditLogger::new(audit_sink.clone()),
        Arc::new(FixedClock(Utc::now())),
    );
    (service, workspaces, audit_sink)
}

async fn audit_kinds(sink: &MemAudit) -> Vec<String> {
    // The audit writer runs on a background task.
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    sink.records.lock().iter().map(|r| r.kind.clone()).collect()
}

#[tokio::test]
async fn test_create_workspace_is_private_and_audited() {
    let (service, _, sink) = service();
    let owner = Actor::employee(Uuid::new_v4());

    let workspace = service.create(owner, "notas").await.unwrap();
    assert_eq!(workspace.visibility, Visibility::Private);
    assert_eq!(workspace.owner_user_id, owner.user_id);

    let kinds = audit_kinds(&sink).await;
    assert!(kinds.contains(&"workspace.created".to_string()));
}

#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let (service, _, _) = service();
    let owner = Actor::employee(Uuid::new_v4());

    service.create(owner, "notas").await.unwrap();
    let error = service.create(owner, "notas").await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::Conflict);

    // A different owner may reuse the name.
    let other = Actor::employee(Uuid::new_v4());
    assert!(service.create(other, "notas").await.is_ok());
}

#[tokio::test]
async fn test_empty_name_rejected() {
    let (service, _, _) = service();
    let owner = Actor::employee(Uuid::new_v4());
    let error = service.create(owner, "   ").await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn test_share_grant_and_revoke_flow() {
    let (service, _, _) = service();
    let owner = Actor::employee(Uuid::new_v4());
    let colleague = Actor::employee(Uuid::new_v4());

    let workspace = service.create(owner, "compartido").await.unwrap();
    service
        .update_visibility(owner, workspace.id, Visibility::Shared)
        .await
        .unwrap();

    // Hidden until granted.
    let error = service.get(colleague, workspace.id).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::NotFound);

    service.grant(owner, workspace.id, colleague.user_id).await.unwrap();
    assert!(service.get(colleague, workspace.id).await.is_ok());

    service
        .revoke(owner, workspace.id, colleague.user_id)
        .await
        .unwrap();
    let error = service.get(colleague, workspace.id).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_grantee_cannot_manage_acl() {
    let (service, _, _) = service();
    let owner = Actor::employee(Uuid::new_v4());
    let colleague = Actor::employee(Uuid::new_v4());
    let third = Actor::employee(Uuid::new_v4());

    let workspace = service.create(owner, "compartido").await.unwrap();
    service
        .update_visibility(owner, workspace.id, Visibility::Shared)
        .await
        .unwrap();
    service.grant(owner, workspace.id, colleague.user_id).await.unwrap();

    let error = service
        .grant(colleague, workspace.id, third.user_id)
        .await
        .unwrap_err();
    assert_eq!(error.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn test_archive_is_terminal() {
    let (service, _, sink) = service();
    let owner = Actor::employee(Uuid::new_v4());

    let workspace = service.create(owner, "viejo").await.unwrap();
    service.archive(owner, workspace.id).await.unwrap();

    // Second archive conflicts; archived workspaces reject writes.
    let error = service.archive(owner, workspace.id).await.unwrap_err();
    assert!(matches!(
        error.code(),
        ErrorCode::Conflict | ErrorCode::Forbidden
    ));

    let kinds = audit_kinds(&sink).await;
    assert!(kinds.contains(&"workspace.archived".to_string()));
}

#[tokio::test]
async fn test_admin_sees_all_employee_sees_own() {
    let (service, _, _) = service();
    let owner = Actor::employee(Uuid::new_v4());
    let stranger = Actor::employee(Uuid::new_v4());
    let admin = Actor::admin(Uuid::new_v4());

    service.create(owner, "uno").await.unwrap();
    service.create(owner, "dos").await.unwrap();

    assert_eq!(service.list(owner, false).await.unwrap().len(), 2);
    assert_eq!(service.list(stranger, false).await.unwrap().len(), 0);
    assert_eq!(service.list(admin, false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_org_read_is_visible_to_employees() {
    let (service, _, _) = service();
    let owner = Actor::employee(Uuid::new_v4());
    let colleague = Actor::employee(Uuid::new_v4());

    let workspace = service.create(owner, "wiki").await.unwrap();
    service
        .update_visibility(owner, workspace.id, Visibility::OrgRead)
        .await
        .unwrap();

    assert!(service.get(colleague, workspace.id).await.is_ok());
    assert_eq!(service.list(colleague, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_feedback_vote_upsert_and_validation() {
    let feedback = Arc::new(MemFeedback::default());
    let service = FeedbackService::new(feedback.clone());
    let actor = Actor::employee(Uuid::new_v4());
    let message_id = Uuid::new_v4();

    service.vote(actor, message_id, 1).await.unwrap();
    service.vote(actor, message_id, -1).await.unwrap();

    let stored = service.get(actor, message_id).await.unwrap().unwrap();
    assert_eq!(stored.value, -1);
    assert_eq!(feedback.votes.lock().len(), 1, "one vote per (message, user)");

    let error = service.vote(actor, message_id, 5).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::Validation);
}
