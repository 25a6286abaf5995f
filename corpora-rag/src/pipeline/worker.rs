//! Single-job-at-a-time ingestion worker.
//!
//! Claims one job, runs the processor under the per-job deadline, then
//! acks or nacks. Several worker processes may run in parallel; the queue
//! hands each claimed job to exactly one of them until its lease expires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use corpora_config::IngestionConfig;
use corpora_core::traits::{Job, JobQueue};
use corpora_core::Result;

use super::processor::{IngestProcessor, ProcessOutcome};

/// Claim/execute/ack loop around [`IngestProcessor`].
pub struct IngestWorker {
    queue: Arc<dyn JobQueue>,
    processor: Arc<IngestProcessor>,
    visibility: Duration,
    deadline: Duration,
    idle_poll: Duration,
    shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for IngestWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestWorker")
            .field("visibility", &self.visibility)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl IngestWorker {
    pub(crate) fn new(
        queue: Arc<dyn JobQueue>,
        processor: Arc<IngestProcessor>,
        config: &IngestionConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            processor,
            visibility: Duration::from_secs(config.queue_visibility_secs),
            deadline: Duration::from_secs(config.job_deadline_secs),
            idle_poll: Duration::from_millis(config.idle_poll_ms),
            shutdown,
        }
    }

    /// Run until the shutdown signal flips.
    pub async fn run(mut self) {
        info!("ingest worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let handled = match self.poll_once().await {
                Ok(handled) => handled,
                Err(error) => {
                    warn!(%error, "worker poll failed; backing off");
                    false
                }
            };

            if !handled {
                tokio::select! {
                    _ = tokio::time::sleep(self.idle_poll) => {}
                    _ = self.shutdown.changed() => {}
                }
            }
        }
        info!("ingest worker stopped");
    }

    /// Claim and handle at most one job. Returns whether one was handled.
    ///
    /// # Errors
    ///
    /// `Database` when the queue itself is unreachable.
    pub async fn poll_once(&self) -> Result<bool> {
        let Some(job) = self.queue.claim(self.visibility).await? else {
            return Ok(false);
        };
        self.handle(job).await?;
        Ok(true)
    }

    async fn handle(&self, job: Job) -> Result<()> {
        info!(
            job_id = %job.id,
            document_id = %job.document_id,
            attempt = job.attempt,
            "processing claimed job"
        );

        match tokio::time::timeout(self.deadline, self.processor.process(job.document_id)).await {
            Ok(Ok(outcome)) => {
                if let ProcessOutcome::Failed { message } = &outcome {
                    warn!(document_id = %job.document_id, message, "job finished with terminal failure");
                }
                self.queue.ack(job.id).await
            }
            Ok(Err(error)) => {
                // Transient: the processor already released the document.
                if job.last_attempt() {
                    warn!(
                        document_id = %job.document_id,
                        %error,
                        "retry budget exhausted; failing document"
                    );
                    self.processor
                        .fail_document(
                            job.document_id,
                            &format!("retries exhausted: {error}"),
                        )
                        .await?;
                    self.queue.ack(job.id).await
                } else {
                    self.queue.nack(job.id).await
                }
            }
            Err(_elapsed) => {
                warn!(document_id = %job.document_id, "per-job deadline exceeded");
                self.processor
                    .fail_document(job.document_id, "processing deadline exceeded")
                    .await?;
                self.queue.ack(job.id).await
            }
        }
    }
}
