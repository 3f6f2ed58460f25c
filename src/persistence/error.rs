//! Persistence layer error types

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Item not found (or owned by someone else)
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Input rejected before storing
    #[error("Invalid {entity_type}: {message}")]
    Invalid {
        entity_type: &'static str,
        message: String,
    },
}

impl PersistenceError {
    pub fn agent_not_found(agent_id: i64) -> Self {
        Self::NotFound {
            entity_type: "Agent",
            identifier: agent_id.to_string(),
        }
    }

    /// Convert to HTTP status code for API responses
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;
