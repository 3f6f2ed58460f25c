//! Error types for the agent adapter

use thiserror::Error;

use super::config::ProviderKind;

/// Errors surfaced by `AgentAdapter::converse` and `AgentAdapter::converse_stream`
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing/blank credential or unrecognized provider. Caller's fault, not retryable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything that went wrong talking to the provider
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl AgentError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AgentError::Configuration(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, AgentError::Configuration(_))
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, AgentError::Upstream(_))
    }
}

/// Provider-side failures
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Provider answered with a status >= 400
    #[error("{provider} API error: {status} - {message}")]
    Status {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    /// Connection failure, timeout, or a body that could not be read
    #[error("{provider} network error: {source}")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    /// No response headers within the per-call limit
    #[error("{provider} request timed out")]
    Timeout { provider: ProviderKind },

    /// Success status but the body did not have the expected shape
    #[error("unexpected response format from {provider}: {detail}")]
    Format {
        provider: ProviderKind,
        detail: String,
    },
}

impl UpstreamError {
    pub fn format(provider: ProviderKind, detail: impl Into<String>) -> Self {
        UpstreamError::Format {
            provider,
            detail: detail.into(),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            UpstreamError::Status { provider, .. }
            | UpstreamError::Transport { provider, .. }
            | UpstreamError::Timeout { provider }
            | UpstreamError::Format { provider, .. } => *provider,
        }
    }

    /// HTTP status reported by the provider, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            UpstreamError::Timeout { .. } | UpstreamError::Format { .. } => None,
        }
    }

    /// Human-readable message without the provider/status decoration
    pub fn message(&self) -> String {
        match self {
            UpstreamError::Status { message, .. } => message.clone(),
            UpstreamError::Transport { source, .. } => {
                if source.is_timeout() {
                    "request timed out".to_string()
                } else if source.is_connect() {
                    format!("connection error: {}", source)
                } else {
                    source.to_string()
                }
            }
            UpstreamError::Timeout { .. } => "request timed out".to_string(),
            UpstreamError::Format { detail, .. } => format!("unexpected response format: {}", detail),
        }
    }
}

/// Result type alias for adapter operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for provider calls
pub type UpstreamResult<T> = Result<T, UpstreamError>;
