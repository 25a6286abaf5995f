//! # corpora-core
//!
//! Domain types, error taxonomy and port traits for the corpora RAG
//! service.
//!
//! This crate holds everything the use-case crates share:
//! - `types`: workspaces, documents, chunks, conversations, audit records
//! - `error`: the [`CorporaError`] taxonomy with stable wire codes
//! - `actor`: resolved request identities and global roles
//! - `traits`: the narrow ports adapters implement (object store,
//!   embedding backend, LLM backend, key-value cache, job queue, clock,
//!   repositories)
//!
//! It depends on no adapter crate; the dependency arrows all point here.

#![warn(missing_debug_implementations)]

pub mod actor;
pub mod error;
pub mod traits;
pub mod types;

pub use actor::{Actor, GlobalRole};
pub use error::{CorporaError, ErrorCode, Result};
