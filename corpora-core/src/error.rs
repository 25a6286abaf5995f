//! Error taxonomy shared by every corpora crate.
//!
//! Use cases return `Result<T, CorporaError>`; adapters translate upstream
//! failures into this taxonomy at the edge and never let provider or driver
//! error types cross a crate boundary.

use thiserror::Error;
use uuid::Uuid;

/// Stable wire codes consumed by the (out-of-scope) HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Entity absent, or denied in a way that must not reveal existence.
    NotFound,
    /// Policy denies the operation.
    Forbidden,
    /// State precondition violated.
    Conflict,
    /// Input shape or constraint violation.
    Validation,
    /// Embedding provider failure after exhausted retries.
    EmbeddingError,
    /// LLM provider failure after exhausted retries.
    LlmError,
    /// Object storage I/O failure.
    StorageError,
    /// Database failure.
    DbError,
    /// Deadline exceeded.
    Timeout,
    /// Unclassified failure or invariant violation.
    Internal,
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::Validation => "VALIDATION",
            Self::EmbeddingError => "EMBEDDING_ERROR",
            Self::LlmError => "LLM_ERROR",
            Self::StorageError => "STORAGE_ERROR",
            Self::DbError => "DB_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Internal => "INTERNAL",
        }
    }
}

/// Error type for all corpora operations.
#[derive(Debug, Error)]
pub enum CorporaError {
    #[error("{resource} not found")]
    NotFound {
        /// Kind of entity that was looked up ("workspace", "document", ...).
        resource: &'static str,
        /// Identifier that was looked up, when one exists.
        id: Option<Uuid>,
    },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("conflict: {message}")]
    Conflict {
        message: String,
        resource: Option<Uuid>,
    },

    #[error("validation: {message}")]
    Validation { message: String },

    #[error("embedding provider error: {message}")]
    Embedding {
        message: String,
        /// HTTP status carried by the provider response, when there was one.
        status: Option<u16>,
    },

    #[error("llm provider error: {message}")]
    Llm {
        message: String,
        status: Option<u16>,
    },

    #[error("object storage error: {message}")]
    Storage { message: String },

    #[error("database error: {message}")]
    Database { message: String },

    #[error("timeout: {message}")]
    Timeout { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CorporaError {
    /// Entity lookup miss (or masked denial) for `resource` with a known id.
    #[must_use]
    pub const fn not_found(resource: &'static str, id: Uuid) -> Self {
        Self::NotFound {
            resource,
            id: Some(id),
        }
    }

    /// Policy denial.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// State precondition violation on a known resource.
    pub fn conflict(message: impl Into<String>, resource: Option<Uuid>) -> Self {
        Self::Conflict {
            message: message.into(),
            resource,
        }
    }

    /// Input constraint violation.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Unclassified failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wire code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Embedding { .. } => ErrorCode::EmbeddingError,
            Self::Llm { .. } => ErrorCode::LlmError,
            Self::Storage { .. } => ErrorCode::StorageError,
            Self::Database { .. } => ErrorCode::DbError,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// HTTP status attached by a provider adapter, when one exists.
    #[must_use]
    pub const fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Embedding { status, .. } | Self::Llm { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<std::io::Error> for CorporaError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, CorporaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            CorporaError::not_found("document", Uuid::nil()).code().as_str(),
            "NOT_FOUND"
        );
        assert_eq!(
            CorporaError::validation("empty query").code().as_str(),
            "VALIDATION"
        );
        assert_eq!(
            CorporaError::Embedding {
                message: "boom".to_string(),
                status: Some(503),
            }
            .code()
            .as_str(),
            "EMBEDDING_ERROR"
        );
    }

    #[test]
    fn test_provider_status_only_on_provider_errors() {
        let err = CorporaError::Llm {
            message: "rate limited".to_string(),
            status: Some(429),
        };
        assert_eq!(err.provider_status(), Some(429));
        assert_eq!(CorporaError::validation("x").provider_status(), None);
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: CorporaError = io.into();
        assert_eq!(err.code(), ErrorCode::StorageError);
    }
}
