//! OpenAI-compatible backend (OpenAI, Fireworks) with SSE streaming

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    BackendContext, CompletionRequest, FragmentSender, FragmentStream, ProviderAuth, ProviderBackend,
};
use crate::agents::config::ProviderKind;
use crate::agents::domain::{Completion, FinishReason, Message, Role};
use crate::agents::error::{UpstreamError, UpstreamResult};

const DATA_PREFIX: &str = "data: ";
const DONE_TOKEN: &str = "[DONE]";

/// Backend for providers speaking the OpenAI chat-completions shape.
/// OpenAI and Fireworks differ only in endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    kind: ProviderKind,
    context: BackendContext,
}

impl OpenAiCompatibleBackend {
    pub fn new(kind: ProviderKind, context: BackendContext) -> Self {
        Self { kind, context }
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.context.client.endpoints().base_url(self.kind)
        )
    }

    /// Build the chat-completions request body
    pub fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        let config = &self.context.config;
        let mut body = json!({
            "model": config.normalized_model(),
            "messages": convert_messages(&request.messages),
            "temperature": config.temperature,
            "max_tokens": request.max_tokens,
        });

        if let Some(top_p) = config.top_p {
            body["top_p"] = json!(top_p);
        }

        if let Some(top_k) = config.top_k {
            body["top_k"] = json!(top_k);
        }

        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    /// Pull `choices[0].message.content` and `choices[0].finish_reason`
    pub fn extract_completion(provider: ProviderKind, body: Value) -> UpstreamResult<Completion> {
        let response: OpenAiResponse = serde_json::from_value(body)
            .map_err(|e| UpstreamError::format(provider, e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::format(provider, "no choices in response"))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some(reason) if reason == provider.truncation_signal() => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(Completion {
            text: choice.message.content,
            finish_reason,
        })
    }

    async fn stream_completion(&self, body: Value, sender: &FragmentSender) -> UpstreamResult<()> {
        let provider = self.kind;
        let client = &self.context.client;
        let url = self.url();
        let response = tokio::select! {
            _ = sender.closed() => return Ok(()),
            response = client.open_stream(
                provider,
                &url,
                ProviderAuth::Bearer(&self.context.credential),
                &body,
            ) => response?,
        };

        // Silence longer than the per-call limit ends the stream; any bytes,
        // keep-alive comments included, reset the clock.
        let idle_limit = client.timeout();
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = tokio::select! {
                _ = sender.closed() => {
                    tracing::debug!(provider = %provider, "Stream consumer went away, closing provider connection");
                    return Ok(());
                }
                next = tokio::time::timeout(idle_limit, bytes.next()) => {
                    match next.map_err(|_| UpstreamError::Timeout { provider })? {
                        Some(chunk) => chunk,
                        None => break,
                    }
                }
            };
            let chunk = chunk.map_err(|source| UpstreamError::Transport { provider, source })?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if !forward_line(&String::from_utf8_lossy(&line), sender).await {
                    return Ok(());
                }
            }
        }

        if !buffer.is_empty() {
            forward_line(&String::from_utf8_lossy(&buffer), sender).await;
        }

        Ok(())
    }
}

fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            json!({
                "role": match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                "content": m.content,
            })
        })
        .collect()
}

/// Classification of one line of the event transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// Blank, malformed, or carrying no text
    Skip,
    /// Incremental `delta.content`
    Text(String),
    /// Terminator token
    End,
}

/// Parse one line of an OpenAI-style SSE body
pub fn parse_stream_line(line: &str) -> StreamLine {
    let line = line.trim();
    if line.is_empty() {
        return StreamLine::Skip;
    }

    let data = line.strip_prefix(DATA_PREFIX).unwrap_or(line).trim();
    if data == DONE_TOKEN {
        return StreamLine::End;
    }

    let parsed: OpenAiStreamResponse = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(_) => return StreamLine::Skip,
    };

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(StreamLine::Text)
        .unwrap_or(StreamLine::Skip)
}

/// Returns false when the stream should stop (terminator or consumer gone)
async fn forward_line(line: &str, sender: &FragmentSender) -> bool {
    match parse_stream_line(line) {
        StreamLine::End => false,
        StreamLine::Text(text) => sender.send_text(text).await.is_ok(),
        StreamLine::Skip => true,
    }
}

#[async_trait]
impl ProviderBackend for OpenAiCompatibleBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(&self, request: &CompletionRequest) -> UpstreamResult<Completion> {
        let body = self.build_request_body(request, false);
        tracing::debug!(
            provider = %self.kind,
            model = %self.context.config.normalized_model(),
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .context
            .client
            .call_json(
                self.kind,
                &self.url(),
                ProviderAuth::Bearer(&self.context.credential),
                &body,
            )
            .await?;

        Self::extract_completion(self.kind, response)
    }

    fn complete_stream(&self, request: CompletionRequest) -> FragmentStream {
        let (sender, stream) = FragmentStream::channel(64);
        let body = self.build_request_body(&request, true);
        let backend = self.clone();

        tokio::spawn(async move {
            if let Err(e) = backend.stream_completion(body, &sender).await {
                let _ = sender.send_error(e).await;
            }
            tracing::debug!(provider = %backend.kind, "Provider stream finished");
        });

        stream
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}
