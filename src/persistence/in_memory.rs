//! In-memory repository

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::error::{PersistenceError, PersistenceResult};
use super::models::{AgentDraft, AgentRecord, AgentUpdate, ChatMessage, Sender};
use super::ChatRepository;

#[derive(Default)]
struct Tables {
    next_agent_id: i64,
    next_message_id: i64,
    agents: BTreeMap<i64, AgentRecord>,
    messages: Vec<ChatMessage>,
}

impl Tables {
    fn owned_agent_mut(&mut self, owner_id: &str, agent_id: i64) -> PersistenceResult<&mut AgentRecord> {
        self.agents
            .get_mut(&agent_id)
            .filter(|agent| agent.owner_id == owner_id)
            .ok_or_else(|| PersistenceError::agent_not_found(agent_id))
    }
}

/// Repository backed by process memory; ids are assigned from 1
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate_name(name: &str) -> PersistenceResult<()> {
    if name.trim().is_empty() {
        return Err(PersistenceError::Invalid {
            entity_type: "Agent",
            message: "name must not be empty".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl ChatRepository for InMemoryRepository {
    async fn create_agent(&self, owner_id: &str, draft: AgentDraft) -> PersistenceResult<AgentRecord> {
        validate_name(&draft.name)?;

        let mut tables = self.tables.write().await;
        tables.next_agent_id += 1;
        let record = AgentRecord {
            id: tables.next_agent_id,
            owner_id: owner_id.to_string(),
            name: draft.name,
            role: draft.role,
            goal: draft.goal,
            model_name: draft.model_name,
            temperature: draft.temperature,
            max_tokens: draft.max_tokens,
            top_p: draft.top_p,
            top_k: draft.top_k,
            provider: draft.provider,
            api_key: draft.api_key.filter(|key| !key.trim().is_empty()),
            created_at: Utc::now(),
        };
        tables.agents.insert(record.id, record.clone());

        tracing::debug!(agent_id = record.id, owner_id, "Agent created");
        Ok(record)
    }

    async fn list_agents(&self, owner_id: &str) -> PersistenceResult<Vec<AgentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .agents
            .values()
            .filter(|agent| agent.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get_agent(&self, owner_id: &str, agent_id: i64) -> PersistenceResult<AgentRecord> {
        let tables = self.tables.read().await;
        tables
            .agents
            .get(&agent_id)
            .filter(|agent| agent.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| PersistenceError::agent_not_found(agent_id))
    }

    async fn update_agent(
        &self,
        owner_id: &str,
        agent_id: i64,
        update: AgentUpdate,
    ) -> PersistenceResult<AgentRecord> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }

        let mut tables = self.tables.write().await;
        let agent = tables.owned_agent_mut(owner_id, agent_id)?;
        update.apply(agent);
        Ok(agent.clone())
    }

    async fn delete_agent(&self, owner_id: &str, agent_id: i64) -> PersistenceResult<()> {
        let mut tables = self.tables.write().await;
        tables.owned_agent_mut(owner_id, agent_id)?;
        tables.agents.remove(&agent_id);
        tables.messages.retain(|m| m.agent_id != agent_id);

        tracing::debug!(agent_id, owner_id, "Agent deleted");
        Ok(())
    }

    async fn add_message(
        &self,
        agent_id: i64,
        sender: Sender,
        message: &str,
    ) -> PersistenceResult<ChatMessage> {
        let mut tables = self.tables.write().await;
        if !tables.agents.contains_key(&agent_id) {
            return Err(PersistenceError::agent_not_found(agent_id));
        }

        tables.next_message_id += 1;
        let record = ChatMessage {
            id: tables.next_message_id,
            agent_id,
            sender,
            message: message.to_string(),
            created_at: Utc::now(),
        };
        tables.messages.push(record.clone());
        Ok(record)
    }

    async fn history(&self, agent_id: i64) -> PersistenceResult<Vec<ChatMessage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.agent_id == agent_id)
            .cloned()
            .collect())
    }
}
