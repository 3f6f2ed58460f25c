//! Google Gemini backend
//!
//! Gemini is called through generateContent only; streaming is simulated by
//! replaying the complete text in fixed windows.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{BackendContext, CompletionRequest, FragmentStream, ProviderAuth, ProviderBackend};
use crate::agents::config::ProviderKind;
use crate::agents::domain::{Completion, FinishReason, Message, Role};
use crate::agents::error::{UpstreamError, UpstreamResult};

/// Google Gemini backend
#[derive(Clone)]
pub struct GeminiBackend {
    context: BackendContext,
}

impl GeminiBackend {
    pub fn new(context: BackendContext) -> Self {
        Self { context }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.context.client.endpoints().base_url(ProviderKind::Gemini),
            self.context.config.normalized_model()
        )
    }

    /// Build the generateContent request body
    pub fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let config = &self.context.config;

        let mut generation_config = json!({
            "temperature": config.temperature,
            "maxOutputTokens": request.max_tokens,
        });

        if let Some(top_p) = config.top_p {
            generation_config["topP"] = json!(top_p);
        }

        if let Some(top_k) = config.top_k {
            generation_config["topK"] = json!(top_k);
        }

        json!({
            "contents": convert_messages(&request.messages),
            "generationConfig": generation_config,
        })
    }

    /// Pull `candidates[0].content.parts[0].text` and `candidates[0].finishReason`
    pub fn extract_completion(body: Value) -> UpstreamResult<Completion> {
        let provider = ProviderKind::Gemini;
        let response: GeminiResponse = serde_json::from_value(body)
            .map_err(|e| UpstreamError::format(provider, e.to_string()))?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::format(provider, "no candidates in response"))?;

        let part = candidate
            .content
            .parts
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::format(provider, "candidate has no parts"))?;

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some(reason) if reason == provider.truncation_signal() => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(Completion {
            text: part.text,
            finish_reason,
        })
    }
}

/// Gemini has no system turn; system messages are dropped
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::System => return None,
                Role::User => "user",
                Role::Assistant => "model",
            };
            Some(json!({
                "role": role,
                "parts": [{ "text": m.content }],
            }))
        })
        .collect()
}

#[async_trait]
impl ProviderBackend for GeminiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(&self, request: &CompletionRequest) -> UpstreamResult<Completion> {
        let body = self.build_request_body(request);
        tracing::debug!(
            provider = "gemini",
            model = %self.context.config.normalized_model(),
            max_tokens = request.max_tokens,
            "Sending generateContent request"
        );

        let response = self
            .context
            .client
            .call_json(
                ProviderKind::Gemini,
                &self.url(),
                ProviderAuth::QueryKey(&self.context.credential),
                &body,
            )
            .await?;

        Self::extract_completion(response)
    }

    fn complete_stream(&self, request: CompletionRequest) -> FragmentStream {
        let (sender, stream) = FragmentStream::channel(16);
        let backend = self.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = sender.closed() => return,
                result = backend.complete(&request) => result,
            };
            match result {
                Ok(completion) => {
                    let _ = sender
                        .send_windowed(&completion.text, &backend.context.pacing)
                        .await;
                }
                Err(e) => {
                    let _ = sender.send_error(e).await;
                }
            }
        });

        stream
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: String,
}
