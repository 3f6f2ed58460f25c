//! Service layer error types

use axum::http::StatusCode;
use thiserror::Error;

use crate::agents::AgentError;
use crate::persistence::PersistenceError;

/// Errors surfaced by [`ChatService`](super::ChatService)
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Agent not found")]
    NotFound,

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Persistence(PersistenceError),
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { .. } => Self::NotFound,
            other => Self::Persistence(other),
        }
    }
}

impl ServiceError {
    /// Convert to HTTP status code for API responses
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Agent(AgentError::Configuration(_)) => StatusCode::BAD_REQUEST,
            Self::Agent(AgentError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            Self::Persistence(e) => e.status_code(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
