//! Storage for agents and their chat history
//!
//! # Architecture
//!
//! - `ChatRepository`: the port every store implements
//! - `InMemoryRepository`: process-local store used by the server and tests
//! - `models`: stored records and create/update inputs
//!
//! Every agent operation is scoped by owner. An agent owned by someone else
//! is reported as not found.

pub mod error;
pub mod in_memory;
pub mod models;

pub use error::{PersistenceError, PersistenceResult};
pub use in_memory::InMemoryRepository;
pub use models::{AgentDraft, AgentRecord, AgentUpdate, ChatMessage, Sender};

use async_trait::async_trait;

/// Repository for agents and chat messages
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn create_agent(&self, owner_id: &str, draft: AgentDraft) -> PersistenceResult<AgentRecord>;

    /// All agents of one owner, oldest first
    async fn list_agents(&self, owner_id: &str) -> PersistenceResult<Vec<AgentRecord>>;

    async fn get_agent(&self, owner_id: &str, agent_id: i64) -> PersistenceResult<AgentRecord>;

    async fn update_agent(
        &self,
        owner_id: &str,
        agent_id: i64,
        update: AgentUpdate,
    ) -> PersistenceResult<AgentRecord>;

    /// Remove an agent together with its messages
    async fn delete_agent(&self, owner_id: &str, agent_id: i64) -> PersistenceResult<()>;

    async fn add_message(
        &self,
        agent_id: i64,
        sender: Sender,
        message: &str,
    ) -> PersistenceResult<ChatMessage>;

    /// Messages of one agent in insertion order
    async fn history(&self, agent_id: i64) -> PersistenceResult<Vec<ChatMessage>>;
}
