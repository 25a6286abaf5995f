//! PostgreSQL repository implementations.

pub mod audit;
pub mod conversations;
pub mod documents;
pub mod feedback;
pub mod workspaces;

pub use audit::PgAuditRepository;
pub use conversations::PgConversationRepository;
pub use documents::PgDocumentRepository;
pub use feedback::PgFeedbackRepository;
pub use workspaces::PgWorkspaceRepository;
