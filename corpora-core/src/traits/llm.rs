//! LLM provider port.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{CorporaError, Result};

/// Receiver half of a provider token stream.
///
/// The producer pushes tokens as they arrive; an `Err` item terminates the
/// stream. Dropping the receiver closes the provider stream.
pub type TokenStream = mpsc::Receiver<std::result::Result<String, CorporaError>>;

/// A chat-completion provider answering strictly from supplied context.
///
/// Implementations render the versioned prompt template around the query
/// and context; the template enforces the context-only answering policy.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Produce a complete answer for `query` grounded in `context`.
    async fn generate_answer(&self, query: &str, context: &str) -> Result<String>;

    /// Open a token stream for `query` grounded in `context`.
    ///
    /// Only establishment failures are retryable; once a token has been
    /// yielded, stream errors surface to the consumer as-is.
    async fn generate_stream(&self, query: &str, context: &str) -> Result<TokenStream>;

    /// Version tag of the prompt template in use.
    fn prompt_version(&self) -> &str;
}
