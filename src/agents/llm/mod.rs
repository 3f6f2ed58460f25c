//! Provider implementations behind one request/response contract
//!
//! - OpenAI and Fireworks share the OpenAI chat-completions wire shape
//! - Google Gemini uses generateContent with a query-string key
//!
//! Every backend supports a blocking `complete` and an incremental
//! `complete_stream`; the continuation loop lives above this layer.

mod gemini;
mod openai;
mod stream;

pub use gemini::GeminiBackend;
pub use openai::{parse_stream_line, OpenAiCompatibleBackend, StreamLine};
pub use stream::*;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::config::{AgentConfig, ProviderKind};
use crate::agents::domain::{Completion, Message};
use crate::agents::error::{UpstreamError, UpstreamResult};

/// Fixed per-call limit for provider requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for provider backends
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Which provider this backend talks to
    fn kind(&self) -> ProviderKind;

    /// One blocking round-trip
    async fn complete(&self, request: &CompletionRequest) -> UpstreamResult<Completion>;

    /// First-pass text delivered as fragments. No continuation is attempted.
    fn complete_stream(&self, request: CompletionRequest) -> FragmentStream;
}

/// Provider-agnostic request: the conversation so far plus the token budget
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, max_tokens: u32) -> Self {
        Self { messages, max_tokens }
    }
}

/// Base URLs for each provider
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderEndpoints {
    pub openai_base_url: String,
    pub fireworks_base_url: String,
    pub gemini_base_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".to_string(),
            fireworks_base_url: "https://api.fireworks.ai/inference/v1".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl ProviderEndpoints {
    pub fn base_url(&self, provider: ProviderKind) -> &str {
        let url = match provider {
            ProviderKind::OpenAi => &self.openai_base_url,
            ProviderKind::Fireworks => &self.fireworks_base_url,
            ProviderKind::Gemini => &self.gemini_base_url,
        };
        url.trim_end_matches('/')
    }
}

/// How a request authenticates
pub enum ProviderAuth<'a> {
    /// `Authorization: Bearer <key>`
    Bearer(&'a SecretString),
    /// `?key=<key>`
    QueryKey(&'a SecretString),
}

/// HTTP leaf shared by every backend.
///
/// Performs a single POST, applies the per-call timeout, and turns error
/// statuses into [`UpstreamError::Status`]. Never retries.
/// Blocking calls bound the whole exchange; streams bound only the wait for headers.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    endpoints: Arc<ProviderEndpoints>,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(endpoints: ProviderEndpoints, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints: Arc::new(endpoints),
            timeout,
        }
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request(&self, url: &str, auth: ProviderAuth<'_>, body: &Value) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);

        match auth {
            ProviderAuth::Bearer(key) => {
                builder.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()))
            }
            ProviderAuth::QueryKey(key) => builder.query(&[("key", key.expose_secret())]),
        }
    }

    /// POST `body` and return the response once its status is known to be < 400.
    /// The limit covers the whole exchange, body included.
    pub async fn send(
        &self,
        provider: ProviderKind,
        url: &str,
        auth: ProviderAuth<'_>,
        body: &Value,
    ) -> UpstreamResult<reqwest::Response> {
        let response = self
            .request(url, auth, body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;

        check_status(provider, response).await
    }

    /// POST `body` for an incremental response.
    ///
    /// The limit applies only until the response headers arrive; the body may
    /// then run as long as the provider keeps it open.
    pub async fn open_stream(
        &self,
        provider: ProviderKind,
        url: &str,
        auth: ProviderAuth<'_>,
        body: &Value,
    ) -> UpstreamResult<reqwest::Response> {
        let response = tokio::time::timeout(self.timeout, self.request(url, auth, body).send())
            .await
            .map_err(|_| UpstreamError::Timeout { provider })?
            .map_err(|source| UpstreamError::Transport { provider, source })?;

        check_status(provider, response).await
    }

    /// POST and parse the success body as JSON
    pub async fn call_json(
        &self,
        provider: ProviderKind,
        url: &str,
        auth: ProviderAuth<'_>,
        body: &Value,
    ) -> UpstreamResult<Value> {
        let response = self.send(provider, url, auth, body).await?;
        let text = response
            .text()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;

        serde_json::from_str(&text)
            .map_err(|e| UpstreamError::format(provider, format!("body is not JSON: {}", e)))
    }
}

/// Turn a status >= 400 into [`UpstreamError::Status`]
async fn check_status(
    provider: ProviderKind,
    response: reqwest::Response,
) -> UpstreamResult<reqwest::Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let mut message = extract_error_message(&body);
    if message.trim().is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    tracing::warn!(provider = %provider, status = status.as_u16(), "Provider returned an error: {}", message);
    Err(UpstreamError::Status {
        provider,
        status: status.as_u16(),
        message,
    })
}

/// Pull a readable message out of an error body.
///
/// Reads `error.message`, then `error.status`, then a bare `error` value; anything
/// else (including non-JSON bodies) falls back to the raw text.
pub fn extract_error_message(body: &str) -> String {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.to_string(),
    };

    match parsed.get("error") {
        Some(Value::Object(error)) => error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.get("status").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => body.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Everything a backend needs for one call
#[derive(Clone)]
pub struct BackendContext {
    pub client: ProviderClient,
    pub config: Arc<AgentConfig>,
    pub credential: SecretString,
    pub pacing: StreamPacing,
}

/// Create the backend for `kind`
pub fn create_backend(kind: ProviderKind, context: BackendContext) -> Arc<dyn ProviderBackend> {
    match kind {
        ProviderKind::OpenAi | ProviderKind::Fireworks => {
            Arc::new(OpenAiCompatibleBackend::new(kind, context))
        }
        ProviderKind::Gemini => Arc::new(GeminiBackend::new(context)),
    }
}
