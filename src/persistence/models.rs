//! Stored records: agents and their chat history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::AgentConfig;

/// An agent definition owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub role: Option<String>,
    pub goal: Option<String>,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: i64,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub provider: String,
    /// Stored provider key; never serialized back out
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Snapshot the record as an immutable adapter configuration
    pub fn to_agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::new(&self.name, &self.provider, &self.model_name)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        config.role = self.role.clone();
        config.goal = self.goal.clone();
        config.top_p = self.top_p;
        config.top_k = self.top_k;
        if let Some(key) = &self.api_key {
            config = config.with_credential(key.clone());
        }
        config
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }
}

/// Input for creating an agent. Defaults match the web client's form.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentDraft {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_top_p")]
    pub top_p: Option<f64>,
    #[serde(default = "default_top_k")]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_model_name() -> String {
    "gpt-4-turbo".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> i64 {
    1024
}

fn default_top_p() -> Option<f64> {
    Some(1.0)
}

fn default_top_k() -> Option<i64> {
    Some(50)
}

fn default_provider() -> String {
    "openai".to_string()
}

impl AgentDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            goal: None,
            model_name: default_model_name(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            api_key: None,
            provider: default_provider(),
        }
    }
}

/// Partial update; `None` leaves a field untouched.
/// An empty `api_key` clears the stored key.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub role: Option<String>,
    pub goal: Option<String>,
    pub model_name: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub api_key: Option<String>,
    pub provider: Option<String>,
}

impl AgentUpdate {
    pub fn apply(self, record: &mut AgentRecord) {
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(role) = self.role {
            record.role = Some(role);
        }
        if let Some(goal) = self.goal {
            record.goal = Some(goal);
        }
        if let Some(model_name) = self.model_name {
            record.model_name = model_name;
        }
        if let Some(temperature) = self.temperature {
            record.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            record.max_tokens = max_tokens;
        }
        if let Some(top_p) = self.top_p {
            record.top_p = Some(top_p);
        }
        if let Some(top_k) = self.top_k {
            record.top_k = Some(top_k);
        }
        if let Some(api_key) = self.api_key {
            record.api_key = if api_key.trim().is_empty() { None } else { Some(api_key) };
        }
        if let Some(provider) = self.provider {
            record.provider = provider;
        }
    }
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One persisted chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub agent_id: i64,
    pub sender: Sender,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
