//! Error types shared across the reasoning engine.
//!
//! One error enum covers every failure the pipeline can surface. Each
//! variant maps to a stable wire code (used by the MCP and HTTP layers)
//! and to an HTTP status.

use thiserror::Error;

/// What made a mutation conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The requested parent assignment would create a cycle.
    Cycle,
    /// An entity with the same id already exists.
    DuplicateId,
    /// The entity still has children and cascade was not requested.
    HasChildren,
    /// The status transition requires `force`.
    StatusTransition,
}

impl ConflictKind {
    /// Wire code for the `code` sub-field of application errors.
    pub fn wire_code(&self) -> &'static str {
        match self {
            ConflictKind::Cycle => "CYCLE",
            ConflictKind::DuplicateId
            | ConflictKind::HasChildren
            | ConflictKind::StatusTransition => "TASK_CONFLICT",
        }
    }
}

/// Engine-wide error type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {message}")]
    Conflict { kind: ConflictKind, message: String },

    #[error("knowledge base is empty")]
    KnowledgeEmpty,

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM returned an unusable reply: {0}")]
    LlmBadReply(String),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Build a cycle conflict for a task mutation.
    pub fn cycle(id: &str) -> Self {
        CoreError::Conflict {
            kind: ConflictKind::Cycle,
            message: format!("moving task {id} would create a cycle"),
        }
    }

    /// Build a duplicate-id conflict.
    pub fn duplicate(id: &str) -> Self {
        CoreError::Conflict {
            kind: ConflictKind::DuplicateId,
            message: format!("id already exists: {id}"),
        }
    }

    /// Stable code string carried on the wire.
    pub fn wire_code(&self) -> &'static str {
        match self {
            CoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict { kind, .. } => kind.wire_code(),
            CoreError::KnowledgeEmpty => "KNOWLEDGE_EMPTY",
            CoreError::LlmUnavailable(_) => "LLM_UNAVAILABLE",
            CoreError::LlmBadReply(_) => "LLM_BAD_REPLY",
            CoreError::Timeout(_) => "TIMEOUT",
            CoreError::Cancelled => "CANCELLED",
            CoreError::Io(_) | CoreError::Serde(_) | CoreError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status the gateway maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::InvalidArgument(_) => 400,
            CoreError::NotFound(_) => 404,
            CoreError::Conflict { .. } => 409,
            CoreError::KnowledgeEmpty => 200,
            CoreError::LlmUnavailable(_) => 503,
            CoreError::LlmBadReply(_) => 502,
            CoreError::Timeout(_) => 504,
            CoreError::Cancelled => 499,
            CoreError::Io(_) | CoreError::Serde(_) | CoreError::Internal(_) => 500,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_are_stable() {
        assert_eq!(CoreError::KnowledgeEmpty.wire_code(), "KNOWLEDGE_EMPTY");
        assert_eq!(
            CoreError::LlmUnavailable("offline".into()).wire_code(),
            "LLM_UNAVAILABLE"
        );
        assert_eq!(CoreError::Timeout(500).wire_code(), "TIMEOUT");
        assert_eq!(CoreError::cycle("a").wire_code(), "CYCLE");
        assert_eq!(CoreError::duplicate("a").wire_code(), "TASK_CONFLICT");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(CoreError::InvalidArgument("x".into()).http_status(), 400);
        assert_eq!(CoreError::NotFound("x".into()).http_status(), 404);
        assert_eq!(CoreError::cycle("x").http_status(), 409);
        assert_eq!(CoreError::LlmUnavailable("x".into()).http_status(), 503);
        assert_eq!(CoreError::Timeout(1).http_status(), 504);
    }
}
