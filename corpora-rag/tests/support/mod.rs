//! In-memory fakes for pipeline integration tests.

// Each test binary uses a subset of these fakes.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use corpora_core::traits::repository::{DocumentFilter, ScoredChunk};
use corpora_core::traits::{
    AuditRepository, Clock, ConversationRepository, DocumentRepository, Job, JobQueue, LlmBackend,
    ObjectStore, TokenStream, WorkspaceRepository,
};
use corpora_core::types::{
    AuditRecord, ChunkRecord, Conversation, Document, DocumentStatus, Message, Visibility,
    Workspace, WorkspaceAcl,
};
use corpora_core::{Actor, CorporaError, Result};

pub fn workspace_owned_by(owner: Uuid, visibility: Visibility) -> Workspace {
    let mut ws = Workspace::new("pruebas", owner, Utc::now());
    ws.visibility = visibility;
    ws
}

/// Fixed clock so timestamps are assertable.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct MemWorkspaces {
    pub workspaces: Mutex<HashMap<Uuid, Workspace>>,
    pub acl: Mutex<Vec<WorkspaceAcl>>,
}

impl MemWorkspaces {
    pub fn with(workspace: Workspace) -> Arc<Self> {
        let store = Self::default();
        store.workspaces.lock().insert(workspace.id, workspace);
        Arc::new(store)
    }
}

#[async_trait]
impl WorkspaceRepository for MemWorkspaces {
    async fn create(&self, workspace: &Workspace) -> Result<()> {
        let mut map = self.workspaces.lock();
        let duplicate = map.values().any(|existing| {
            existing.owner_user_id == workspace.owner_user_id && existing.name == workspace.name
        });
        if duplicate {
            return Err(CorporaError::conflict("duplicate name", Some(workspace.id)));
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
                let archived_ok = ws.archived_at.is_none()
                    || (include_archived
                        && (actor.is_admin() || ws.owner_user_id == actor.user_id));
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
pub struct MemDocuments {
    pub documents: Mutex<HashMap<Uuid, Document>>,
    pub chunks: Mutex<Vec<ChunkRecord>>,
}

impl MemDocuments {
    fn title_of(&self, document_id: Uuid) -> String {
        self.documents
            .lock()
            .get(&document_id)
            .map(|doc| doc.title.clone())
            .unwrap_or_default()
    }

    fn searchable(&self, workspace_id: Uuid) -> Vec<ChunkRecord> {
        let documents = self.documents.lock();
        self.chunks
            .lock()
            .iter()
            .filter(|chunk| {
                chunk.workspace_id == workspace_id
                    && documents
                        .get(&chunk.document_id)
                        .is_some_and(|doc| doc.deleted_at.is_none())
            })
            .cloned()
            .collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl DocumentRepository for MemDocuments {
    async fn create(&self, document: &Document) -> Result<()> {
        self.documents.lock().insert(document.id, document.clone());
        Ok(())
    }

    async fn get(&self, workspace_id: Uuid, id: Uuid) -> Result<Option<Document>> {
        Ok(self
            .documents
            .lock()
            .get(&id)
            .filter(|doc| doc.workspace_id == workspace_id && doc.deleted_at.is_none())
            .cloned())
    }

    async fn get_any(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.lock().get(&id).cloned())
    }

    async fn list(
        &self,
        workspace_id: Uuid,
        filter: &DocumentFilter,
        _cursor: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .lock()
            .values()
            .filter(|doc| {
                doc.workspace_id == workspace_id
                    && doc.deleted_at.is_none()
                    && filter.status.map_or(true, |status| doc.status == status)
                    && filter.tag.as_ref().map_or(true, |tag| doc.tags.contains(tag))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn soft_delete(&self, workspace_id: Uuid, id: Uuid) -> Result<bool> {
        let mut documents = self.documents.lock();
        match documents.get_mut(&id) {
            Some(doc) if doc.workspace_id == workspace_id && doc.deleted_at.is_none() => {
                doc.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_metadata(
        &self,
        workspace_id: Uuid,
        id: Uuid,
        title: Option<String>,
        tags: Option<Vec<String>>,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool> {
        let mut documents = self.documents.lock();
        match documents.get_mut(&id) {
            Some(doc) if doc.workspace_id == workspace_id && doc.deleted_at.is_none() => {
                if let Some(title) = title {
                    doc.title = title;
                }
                if let Some(tags) = tags {
                    doc.tags = tags;
                }
                if let Some(metadata) = metadata {
                    doc.metadata = metadata;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<bool> {
        let mut documents = self.documents.lock();
        match documents.get_mut(&id) {
            Some(doc) if doc.status == from => {
                doc.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_failed(&self, id: Uuid, message: &str) -> Result<()> {
        if let Some(doc) = self.documents.lock().get_mut(&id) {
            doc.status = DocumentStatus::Failed;
            doc.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn reset_for_reprocess(&self, id: Uuid) -> Result<()> {
        if let Some(doc) = self.documents.lock().get_mut(&id) {
            doc.status = DocumentStatus::Pending;
            doc.error_message = None;
        }
        Ok(())
    }

    async fn save_document_with_chunks(
        &self,
        document: &Document,
        chunks: &[ChunkRecord],
    ) -> Result<()> {
        let mut stored = self.chunks.lock();
        stored.retain(|chunk| chunk.document_id != document.id);
        stored.extend(chunks.iter().cloned());
        self.documents.lock().insert(document.id, document.clone());
        Ok(())
    }

    async fn find_chunks_similar(
        &self,
        workspace_id: Uuid,
        embedding: &[f32],
        k: u32,
    ) -> Result<Vec<ScoredChunk>> {
        let mut hits: Vec<ScoredChunk> = self
            .searchable(workspace_id)
            .into_iter()
            .map(|chunk| ScoredChunk {
                score: cosine(&chunk.embedding, embedding),
                document_title: self.title_of(chunk.document_id),
                chunk,
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(k as usize);
        Ok(hits)
    }

    async fn find_chunks_full_text(
        &self,
        workspace_id: Uuid,
        query: &str,
        k: u32,
    ) -> Result<Vec<ScoredChunk>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let mut hits: Vec<ScoredChunk> = self
            .searchable(workspace_id)
            .into_iter()
            .filter_map(|chunk| {
                let haystack = chunk.content.to_lowercase();
                let matched = terms.iter().filter(|term| haystack.contains(*term)).count();
                if matched == 0 {
                    return None;
                }
                Some(ScoredChunk {
                    score: matched as f32,
                    document_title: self.title_of(chunk.document_id),
                    chunk,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(k as usize);
        Ok(hits)
    }

    async fn chunk_count(&self, document_id: Uuid) -> Result<u64> {
        Ok(self
            .chunks
            .lock()
            .iter()
            .filter(|chunk| chunk.document_id == document_id)
            .count() as u64)
    }
}

#[derive(Debug)]
struct QueuedJob {
    job: Job,
    status: &'static str,
    locked_until: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct MemQueue {
    jobs: Mutex<Vec<QueuedJob>>,
}

impl MemQueue {
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }
}

#[async_trait]
impl JobQueue for MemQueue {
    async fn enqueue(&self, name: &str, document_id: Uuid, max_attempts: u32) -> Result<Uuid> {
        let job = Job {
            id: Uuid::new_v4(),
            name: name.to_string(),
            document_id,
            attempt: 0,
            max_attempts,
            enqueued_at: Utc::now(),
        };
        let id = job.id;
        self.jobs.lock().push(QueuedJob {
            job,
            status: "queued",
            locked_until: None,
        });
        Ok(id)
    }

    async fn claim(&self, visibility: Duration) -> Result<Option<Job>> {
        let now = Instant::now();
        let mut jobs = self.jobs.lock();
        for queued in jobs.iter_mut() {
            let expired = queued
                .locked_until
                .is_some_and(|deadline| deadline < now);
            if queued.status == "queued" || (queued.status == "claimed" && expired) {
                queued.status = "claimed";
                queued.job.attempt += 1;
                queued.locked_until = Some(now + visibility);
                return Ok(Some(queued.job.clone()));
            }
        }
        Ok(None)
    }

    async fn ack(&self, job_id: Uuid) -> Result<()> {
        self.jobs.lock().retain(|queued| queued.job.id != job_id);
        Ok(())
    }

    async fn nack(&self, job_id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock();
        if let Some(queued) = jobs.iter_mut().find(|queued| queued.job.id == job_id) {
            queued.status = if queued.job.attempt >= queued.job.max_attempts {
                "dead"
            } else {
                "queued"
            };
            queued.locked_until = None;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemObjects {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for MemObjects {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        self.objects.lock().insert(key.to_string(), bytes.to_vec());
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or(CorporaError::Storage {
                message: format!("missing object '{key}'"),
            })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemConversations {
    pub conversations: Mutex<HashMap<Uuid, Conversation>>,
    pub messages: Mutex<Vec<Message>>,
}

#[async_trait]
impl ConversationRepository for MemConversations {
    async fn create(&self, conversation: &Conversation) -> Result<()> {
        self.conversations
            .lock()
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.conversations.lock().get(&id).cloned())
    }

    async fn append_message(&self, message: &Message) -> Result<()> {
        self.messages.lock().push(message.clone());
        Ok(())
    }

    async fn get_messages(&self, conversation_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .iter()
            .filter(|message| message.conversation_id == conversation_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn clear(&self, conversation_id: Uuid) -> Result<()> {
        self.messages
            .lock()
            .retain(|message| message.conversation_id != conversation_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemAudit {
    pub records: Mutex<Vec<AuditRecord>>,
}

#[async_trait]
impl AuditRepository for MemAudit {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// LLM stub: echoes the context so tests can assert evidence made it into
/// the answer, and counts invocations.
#[derive(Debug, Default)]
pub struct StubLlm {
    pub calls: Mutex<u32>,
}

#[async_trait]
impl LlmBackend for StubLlm {
    async fn generate_answer(&self, _query: &str, context: &str) -> Result<String> {
        *self.calls.lock() += 1;
        Ok(format!("RESPUESTA [S1]:\n{context}"))
    }

    async fn generate_stream(&self, _query: &str, context: &str) -> Result<TokenStream> {
        *self.calls.lock() += 1;
        let (sender, receiver) = tokio::sync::mpsc::channel(8);
        let words: Vec<String> = context
            .split_whitespace()
            .take(16)
            .map(str::to_string)
            .collect();
        tokio::spawn(async move {
            for word in words {
                tokio::time::sleep(Duration::from_millis(5)).await;
                if sender.send(Ok(word)).await.is_err() {
                    return;
                }
            }
        });
        Ok(receiver)
    }

    fn prompt_version(&self) -> &str {
        "v2"
    }
}
