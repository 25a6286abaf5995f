//! # corpora-storage
//!
//! Persistence adapters for the corpora service:
//! - `postgres`: pooled backend (deadpool + tokio-postgres), embedded
//!   refinery migrations, driver error translation
//! - `repositories`: pgvector-aware document/chunk store, workspaces and
//!   ACLs, conversations, audit trail, feedback votes
//! - `queue`: `FOR UPDATE SKIP LOCKED` job queue with visibility timeouts
//! - `object_store`: filesystem blob store behind the object-store port

#![warn(missing_debug_implementations)]

pub mod object_store;
pub mod postgres;
pub mod queue;
pub mod repositories;

pub use object_store::FsObjectStore;
pub use postgres::PostgresBackend;
pub use queue::PgJobQueue;
pub use repositories::{
    PgAuditRepository, PgConversationRepository, PgDocumentRepository, PgFeedbackRepository,
    PgWorkspaceRepository,
};
