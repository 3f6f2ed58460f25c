//! Chat service: agent ownership, credentials, and message history around the adapter

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cache::AdapterCache;
use super::error::ServiceResult;
use crate::agents::llm::{ProviderClient, StreamPacing};
use crate::agents::{AgentAdapter, AgentError, EventSender, EventStream, StreamEvent};
use crate::persistence::{AgentDraft, AgentRecord, AgentUpdate, ChatMessage, ChatRepository, Sender};

const MISSING_KEY_MESSAGE: &str = "No API key configured for this agent. Add one when creating the agent or provide api_key with this request.";

/// Body of a chat request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendMessage {
    pub message: String,
    /// Overrides the agent's stored key for this request only
    #[serde(default)]
    pub api_key: Option<String>,
}

impl SendMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Request key, with blank values treated as absent
    fn request_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Result of a blocking chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub user_message_id: i64,
    pub bot_message_id: i64,
}

/// Application service behind the HTTP handlers
pub struct ChatService {
    repository: Arc<dyn ChatRepository>,
    adapters: AdapterCache,
    offline_echo: bool,
}

impl ChatService {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        client: ProviderClient,
        pacing: StreamPacing,
        offline_echo: bool,
    ) -> Self {
        Self {
            repository,
            adapters: AdapterCache::new(client, pacing),
            offline_echo,
        }
    }

    pub async fn create_agent(&self, owner_id: &str, draft: AgentDraft) -> ServiceResult<AgentRecord> {
        Ok(self.repository.create_agent(owner_id, draft).await?)
    }

    pub async fn list_agents(&self, owner_id: &str) -> ServiceResult<Vec<AgentRecord>> {
        Ok(self.repository.list_agents(owner_id).await?)
    }

    pub async fn get_agent(&self, owner_id: &str, agent_id: i64) -> ServiceResult<AgentRecord> {
        Ok(self.repository.get_agent(owner_id, agent_id).await?)
    }

    pub async fn update_agent(
        &self,
        owner_id: &str,
        agent_id: i64,
        update: AgentUpdate,
    ) -> ServiceResult<AgentRecord> {
        Ok(self.repository.update_agent(owner_id, agent_id, update).await?)
    }

    pub async fn delete_agent(&self, owner_id: &str, agent_id: i64) -> ServiceResult<()> {
        self.repository.delete_agent(owner_id, agent_id).await?;
        self.adapters.evict(agent_id).await;
        Ok(())
    }

    /// Persist the prompt, run a blocking completion, persist the reply.
    ///
    /// The user message stays recorded even when the provider call fails.
    pub async fn send(&self, owner_id: &str, agent_id: i64, request: SendMessage) -> ServiceResult<ChatReply> {
        let adapter = self.prepare(owner_id, agent_id, &request).await?;

        let user_message = self
            .repository
            .add_message(agent_id, Sender::User, &request.message)
            .await?;

        let completion = adapter
            .converse(&request.message, request.request_key())
            .await?;

        let bot_message = self
            .repository
            .add_message(agent_id, Sender::Agent, &completion.text)
            .await?;

        Ok(ChatReply {
            response: completion.text,
            user_message_id: user_message.id,
            bot_message_id: bot_message.id,
        })
    }

    /// Streamed variant of [`send`](Self::send).
    ///
    /// `Start` carries the user message id and `Done` the id of the persisted
    /// agent message. Nothing is persisted for the reply when the stream fails.
    pub async fn send_stream(
        &self,
        owner_id: &str,
        agent_id: i64,
        request: SendMessage,
    ) -> ServiceResult<EventStream> {
        let adapter = self.prepare(owner_id, agent_id, &request).await?;

        let user_message = self
            .repository
            .add_message(agent_id, Sender::User, &request.message)
            .await?;

        let events = adapter.converse_stream(
            &request.message,
            request.request_key(),
            user_message.id.to_string(),
        )?;

        let (sender, stream) = EventStream::channel(32);
        tokio::spawn(persist_reply(events, sender, self.repository.clone(), agent_id));

        Ok(stream)
    }

    /// Messages of one owned agent, oldest first
    pub async fn history(&self, owner_id: &str, agent_id: i64) -> ServiceResult<Vec<ChatMessage>> {
        self.repository.get_agent(owner_id, agent_id).await?;
        Ok(self.repository.history(agent_id).await?)
    }

    /// Load the owned agent, check provider and credential, and fetch its adapter
    async fn prepare(
        &self,
        owner_id: &str,
        agent_id: i64,
        request: &SendMessage,
    ) -> ServiceResult<AgentAdapter> {
        let record = self.repository.get_agent(owner_id, agent_id).await?;
        let config = record.to_agent_config();

        config.provider_kind()?;
        if config.resolve_credential(request.request_key())?.is_none() && !self.offline_echo {
            return Err(AgentError::configuration(MISSING_KEY_MESSAGE).into());
        }

        Ok(self.adapters.adapter_for(agent_id, config).await)
    }
}

/// Forward adapter events, persisting the reply before `Done` goes out
async fn persist_reply(
    mut events: EventStream,
    sender: EventSender,
    repository: Arc<dyn ChatRepository>,
    agent_id: i64,
) {
    loop {
        let event = tokio::select! {
            _ = sender.closed() => {
                tracing::debug!(agent_id, "Stream consumer went away");
                return;
            }
            event = events.next_event() => match event {
                Some(event) => event,
                None => return,
            },
        };
        let event = match event {
            StreamEvent::Done { full_text, .. } => {
                match repository.add_message(agent_id, Sender::Agent, &full_text).await {
                    Ok(bot_message) => StreamEvent::done(bot_message.id.to_string(), full_text),
                    Err(e) => {
                        tracing::warn!(agent_id, "Failed to store streamed reply: {}", e);
                        StreamEvent::error(e.to_string())
                    }
                }
            }
            other => other,
        };

        let terminal = event.is_terminal();
        if sender.send(event).await.is_err() {
            tracing::debug!(agent_id, "Stream consumer went away");
            return;
        }
        if terminal {
            return;
        }
    }
}
