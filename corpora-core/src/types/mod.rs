//! Domain entities.

pub mod audit;
pub mod conversation;
pub mod document;
pub mod retrieval;
pub mod workspace;

pub use audit::AuditRecord;
pub use conversation::{Conversation, FeedbackVote, Message, MessageRole};
pub use document::{ChunkRecord, ChunkSecurity, Document, DocumentStatus, EMBEDDING_DIM};
pub use retrieval::FilterMode;
pub use workspace::{AclAccess, Visibility, Workspace, WorkspaceAcl};
