//! Port traits consumed by the use-case layer and implemented by adapters.

pub mod cache;
pub mod clock;
pub mod embedding;
pub mod llm;
pub mod object_store;
pub mod queue;
pub mod repository;

pub use cache::KeyValueCache;
pub use clock::{Clock, SystemClock};
pub use embedding::{EmbeddingBackend, EmbeddingTask};
pub use llm::{LlmBackend, TokenStream};
pub use object_store::ObjectStore;
pub use queue::{Job, JobQueue};
pub use repository::{
    AuditRepository, ConversationRepository, DocumentFilter, DocumentRepository,
    FeedbackRepository, ScoredChunk, WorkspaceRepository, LIST_LIMIT_MAX,
};
