//! # corpora-security
//!
//! The security layer of the corpora service:
//! - `access_control`: the workspace decision table every use case
//!   resolves before touching a repository
//! - `injection`: ingest-time prompt-injection scoring and the
//!   retrieval-time filter (off / downrank / exclude)
//! - `audit`: channel-backed background audit logging

#![warn(missing_debug_implementations)]

pub mod access_control;
pub mod audit;
pub mod injection;

pub use access_control::{authorize_workspace, AccessKind, WorkspacePolicy};
pub use audit::AuditLogger;
pub use injection::{InjectionDetector, InjectionFilter};
