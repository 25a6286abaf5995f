//! # corpora-tenancy
//!
//! Workspace and content management use cases: workspace lifecycle and
//! ACL grants, document listing/maintenance, conversations and feedback
//! votes. Every operation resolves the workspace policy before touching a
//! repository and emits audit events for mutations.

#![warn(missing_debug_implementations)]

pub mod conversations;
pub mod documents;
pub mod feedback;
pub mod workspace;

pub use conversations::ConversationService;
pub use documents::DocumentService;
pub use feedback::FeedbackService;
pub use workspace::WorkspaceService;
