//! Agent adapter: dispatches one conversation turn to the configured provider

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::config::{AgentConfig, ProviderKind};
use crate::agents::continuation::complete_with_continuation;
use crate::agents::domain::{EventSender, EventStream, Message, StreamEvent};
use crate::agents::error::AgentResult;
use crate::agents::llm::{
    create_backend, BackendContext, CompletionRequest, FragmentStream, ProviderBackend,
    ProviderClient, StreamPacing,
};

/// Prompt characters kept by the offline echo
const ECHO_PROMPT_CHARS: usize = 100;

/// Final text of a blocking conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
}

/// Stateless adapter built from one [`AgentConfig`] snapshot.
///
/// Cloning is cheap; the adapter holds no mutable state, so the same instance
/// can serve concurrent requests.
#[derive(Clone)]
pub struct AgentAdapter {
    config: Arc<AgentConfig>,
    client: ProviderClient,
    pacing: StreamPacing,
}

/// What a request resolved to before any I/O happens
enum Route {
    Echo,
    Provider(Arc<dyn ProviderBackend>),
}

impl AgentAdapter {
    pub fn new(config: AgentConfig, client: ProviderClient) -> Self {
        Self {
            config: Arc::new(config),
            client,
            pacing: StreamPacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: StreamPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Blocking completion with truncation recovery.
    ///
    /// With no credential at either level, returns the offline echo instead.
    pub async fn converse(&self, prompt: &str, credential: Option<&str>) -> AgentResult<CompletionResult> {
        let text = match self.route(credential)? {
            Route::Echo => self.echo(prompt).await,
            Route::Provider(backend) => {
                complete_with_continuation(
                    backend.as_ref(),
                    self.initial_messages(prompt),
                    self.config.effective_max_tokens(),
                )
                .await?
            }
        };

        Ok(CompletionResult { text })
    }

    /// Incremental completion.
    ///
    /// Configuration problems are returned before the stream starts. After that
    /// every outcome is an event: `Start`, zero or more `Chunk`s, then exactly one
    /// of `Done` or `Error`. No continuation is attempted.
    pub fn converse_stream(
        &self,
        prompt: &str,
        credential: Option<&str>,
        correlation_id: impl Into<String>,
    ) -> AgentResult<EventStream> {
        let route = self.route(credential)?;
        let correlation_id = correlation_id.into();
        let (sender, stream) = EventStream::channel(32);

        let fragments = match route {
            Route::Echo => self.echo_fragments(prompt),
            Route::Provider(backend) => backend.complete_stream(CompletionRequest::new(
                self.initial_messages(prompt),
                self.config.effective_max_tokens(),
            )),
        };

        tokio::spawn(relay_fragments(fragments, sender, correlation_id));

        Ok(stream)
    }

    /// Validate provider, then credential. Pure; no I/O.
    fn route(&self, credential: Option<&str>) -> AgentResult<Route> {
        let kind: ProviderKind = self.config.provider_kind()?;

        match self.config.resolve_credential(credential)? {
            None => Ok(Route::Echo),
            Some(credential) => Ok(Route::Provider(self.backend(kind, credential))),
        }
    }

    fn backend(&self, kind: ProviderKind, credential: SecretString) -> Arc<dyn ProviderBackend> {
        create_backend(
            kind,
            BackendContext {
                client: self.client.clone(),
                config: self.config.clone(),
                credential,
                pacing: self.pacing,
            },
        )
    }

    fn initial_messages(&self, prompt: &str) -> Vec<Message> {
        vec![
            Message::system(self.config.system_prompt()),
            Message::user(prompt),
        ]
    }

    /// Deterministic local reply used when no credential is configured
    pub fn echo_text(&self, prompt: &str) -> String {
        let truncated: String = prompt.chars().take(ECHO_PROMPT_CHARS).collect();
        format!(
            "[{} - {} | temp={:?}] Echo: {}",
            self.config.name, self.config.model, self.config.temperature, truncated
        )
    }

    async fn echo(&self, prompt: &str) -> String {
        tokio::time::sleep(self.pacing.echo_delay).await;
        self.echo_text(prompt)
    }

    fn echo_fragments(&self, prompt: &str) -> FragmentStream {
        let (sender, stream) = FragmentStream::channel(16);
        let adapter = self.clone();
        let prompt = prompt.to_string();

        tokio::spawn(async move {
            let text = adapter.echo(&prompt).await;
            let _ = sender.send_windowed(&text, &adapter.pacing).await;
        });

        stream
    }
}

/// Forward fragments as events, closing with `Done` or `Error`
async fn relay_fragments(mut fragments: FragmentStream, sender: EventSender, correlation_id: String) {
    if sender.send(StreamEvent::start(correlation_id.clone())).await.is_err() {
        return;
    }

    let mut full_text = String::new();
    loop {
        let fragment = tokio::select! {
            _ = sender.closed() => {
                tracing::debug!(%correlation_id, "Stream consumer went away");
                return;
            }
            fragment = fragments.next_fragment() => match fragment {
                Some(fragment) => fragment,
                None => break,
            },
        };
        match fragment {
            Ok(text) => {
                full_text.push_str(&text);
                if sender.send(StreamEvent::chunk(text)).await.is_err() {
                    tracing::debug!(%correlation_id, "Stream consumer went away");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(%correlation_id, "Stream failed: {}", e);
                let _ = sender.send(StreamEvent::error(e.message())).await;
                return;
            }
        }
    }

    let _ = sender.send(StreamEvent::done(correlation_id, full_text)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::llm::{split_windows, ProviderEndpoints, DEFAULT_TIMEOUT};
    use std::time::Duration;

    fn fast_pacing() -> StreamPacing {
        StreamPacing {
            chunk_chars: 20,
            chunk_delay: Duration::from_millis(1),
            echo_delay: Duration::from_millis(1),
        }
    }

    fn adapter(config: AgentConfig) -> AgentAdapter {
        AgentAdapter::new(config, ProviderClient::new(ProviderEndpoints::default(), DEFAULT_TIMEOUT))
            .with_pacing(fast_pacing())
    }

    #[tokio::test]
    async fn test_echo_without_credential() {
        let config = AgentConfig::new("Ada", "openai", "gpt-4-turbo").with_temperature(0.7);
        let prompt = "x".repeat(150);
        let result = adapter(config).converse(&prompt, None).await.unwrap();

        assert_eq!(
            result.text,
            format!("[Ada - gpt-4-turbo | temp=0.7] Echo: {}", "x".repeat(100))
        );
    }

    #[tokio::test]
    async fn test_echo_for_every_provider() {
        for provider in ["openai", "fireworks", "gemini"] {
            let config = AgentConfig::new("Bot", provider, "model-x").with_temperature(1.5);
            let result = adapter(config).converse("short prompt", None).await.unwrap();
            assert!(result.text.contains("Bot"));
            assert!(result.text.contains("model-x"));
            assert!(result.text.contains("temp=1.5"));
            assert!(result.text.ends_with("Echo: short prompt"));
        }
    }

    #[test]
    fn test_echo_keeps_decimal_point_on_whole_temperatures() {
        let whole = adapter(AgentConfig::new("Ada", "openai", "m").with_temperature(1.0));
        assert_eq!(whole.echo_text("hi"), "[Ada - m | temp=1.0] Echo: hi");

        let zero = adapter(AgentConfig::new("Ada", "openai", "m").with_temperature(0.0));
        assert_eq!(zero.echo_text("hi"), "[Ada - m | temp=0.0] Echo: hi");
    }

    #[tokio::test]
    async fn test_relay_releases_provider_when_consumer_drops() {
        let (fragment_sender, fragments) = FragmentStream::channel(4);
        let (event_sender, mut events) = EventStream::channel(4);
        tokio::spawn(relay_fragments(fragments, event_sender, "msg-1".to_string()));

        fragment_sender.send_text("partial").await.unwrap();
        assert_eq!(events.next_event().await, Some(StreamEvent::start("msg-1")));
        assert_eq!(events.next_event().await, Some(StreamEvent::chunk("partial")));
        drop(events);

        // the provider side never sends again; the relay must still let go of it
        tokio::time::timeout(Duration::from_secs(1), fragment_sender.closed())
            .await
            .expect("fragment stream should be dropped after the consumer leaves");
    }

    #[tokio::test]
    async fn test_blank_credentials_are_configuration_errors() {
        for provider in ["openai", "fireworks", "gemini"] {
            let adapter = adapter(AgentConfig::new("Ada", provider, "m").with_credential("  "));
            let err = adapter.converse("hi", Some("")).await.unwrap_err();
            assert!(err.is_configuration());

            let err = adapter.converse_stream("hi", Some(""), "1").err().unwrap();
            assert!(err.is_configuration());
        }
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let adapter = adapter(AgentConfig::new("Ada", "anthropic", "claude").with_credential("k"));

        let err = adapter.converse("hi", None).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("anthropic"));

        let err = adapter.converse_stream("hi", None, "1").err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("anthropic"));
    }

    #[tokio::test]
    async fn test_echo_stream() {
        let config = AgentConfig::new("Ada", "gemini", "g").with_temperature(0.7);
        let adapter = adapter(config);
        let expected = adapter.echo_text("hello");

        let events = adapter
            .converse_stream("hello", None, "msg-1")
            .unwrap()
            .collect_events()
            .await;

        assert_eq!(events.first(), Some(&StreamEvent::start("msg-1")));
        assert_eq!(events.last(), Some(&StreamEvent::done("msg-1", expected.clone())));

        let chunks: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { content } => Some(content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks.len(), split_windows(&expected, 20).len());
        assert_eq!(chunks.concat(), expected);
    }
}
