//! Ingestion worker daemon.
//!
//! Wires the composition root against PostgreSQL and the configured
//! providers, runs migrations, then drives one or more single-job worker
//! loops until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use corpora_config::CorporaConfig;
use corpora_rag::embeddings::{InMemoryCache, OpenAiEmbeddings};
use corpora_rag::pipeline::PipelineBuilder;
use corpora_security::AuditLogger;
use corpora_storage::{
    FsObjectStore, PgAuditRepository, PgConversationRepository, PgDocumentRepository, PgJobQueue,
    PgWorkspaceRepository, PostgresBackend,
};

#[derive(Debug, Parser)]
#[command(name = "corpora-worker", about = "corpora ingestion worker")]
struct Args {
    /// Path to the TOML configuration file; defaults to env-only config.
    #[arg(long, env = "CORPORA_CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent worker loops in this process.
    #[arg(long, default_value_t = 1)]
    workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CorporaConfig::load_from_file(path)
            .await
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CorporaConfig::from_env().context("building config from environment")?,
    };

    let backend = Arc::new(
        PostgresBackend::new(config.database.clone()).context("constructing database pool")?,
    );
    backend
        .run_migrations()
        .await
        .context("running database migrations")?;

    let documents = Arc::new(PgDocumentRepository::new(backend.clone()));
    let workspaces = Arc::new(PgWorkspaceRepository::new(backend.clone()));
    let conversations = Arc::new(PgConversationRepository::new(backend.clone()));
    let queue = Arc::new(PgJobQueue::new(backend.clone()));
    let audit = AuditLogger::new(Arc::new(PgAuditRepository::new(backend.clone())));
    let objects = Arc::new(FsObjectStore::new(config.object_store.root.clone()));
    let embeddings =
        Arc::new(OpenAiEmbeddings::new(&config.embedding).context("embedding backend")?);

    let builder = PipelineBuilder::new(config)
        .with_workspaces(workspaces)
        .with_documents(documents)
        .with_conversations(conversations)
        .with_object_store(objects)
        .with_queue(queue)
        .with_cache(Arc::new(InMemoryCache::default()))
        .with_embedding_backend(embeddings)
        .with_audit(audit);

    let processor = builder.build_processor().context("building processor")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(args.workers.max(1));
    for _ in 0..args.workers.max(1) {
        let worker = builder
            .build_worker(processor.clone(), shutdown_rx.clone())
            .context("building worker")?;
        handles.push(tokio::spawn(worker.run()));
    }
    info!(workers = handles.len(), "ingestion workers running");

    tokio::signal::ctrl_c().await.context("waiting for SIGINT")?;
    info!("shutdown requested; draining workers");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
