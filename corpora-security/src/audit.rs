//! Background audit logging.
//!
//! Events are queued onto an unbounded channel and written by a background
//! task; emission never blocks a request and append failures are swallowed
//! with a warning, so audit can never take a use case down with it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use corpora_core::traits::AuditRepository;
use corpora_core::types::AuditRecord;

/// Handle for emitting audit events.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    sender: mpsc::UnboundedSender<AuditRecord>,
}

impl AuditLogger {
    /// Spawn the background writer over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditRecord>();

        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                info!(
                    kind = %record.kind,
                    workspace_id = ?record.workspace_id,
                    actor_user_id = ?record.actor_user_id,
                    "audit event"
                );
                if let Err(error) = repository.append(&record).await {
                    warn!(kind = %record.kind, %error, "failed to persist audit event");
                }
            }
        });

        Self { sender }
    }

    /// Queue a record for persistence. Failures are swallowed.
    pub fn emit(&self, record: AuditRecord) {
        if self.sender.send(record).is_err() {
            warn!("audit channel closed; event dropped");
        }
    }
}
