//! Per-request agent configuration

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::{AgentError, AgentResult};

/// Token budget used when the configured value is absent or not positive
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAi,
    /// Fireworks (OpenAI-compatible wire shape)
    Fireworks,
    /// Google Gemini generateContent
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Fireworks => "fireworks",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Finish signal meaning "stopped because of the token budget"
    pub fn truncation_signal(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi | ProviderKind::Fireworks => "length",
            ProviderKind::Gemini => "MAX_TOKENS",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "fireworks" => Ok(ProviderKind::Fireworks),
            "gemini" => Ok(ProviderKind::Gemini),
            _ => Err(AgentError::configuration(format!(
                "Unsupported provider '{}'",
                s
            ))),
        }
    }
}

/// Immutable configuration an adapter is built from.
///
/// The surrounding service rebuilds one of these from the stored agent record on
/// every request; nothing here is mutated in place.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Display identity, used in the system prompt and the offline echo
    pub name: String,
    pub role: Option<String>,
    pub goal: Option<String>,
    /// Raw provider identifier as stored; validated on dispatch
    pub provider: String,
    /// Provider-specific model id, normalized before transmission
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    /// Agent-level API key; a request-level key overrides it
    pub credential: Option<SecretString>,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            goal: None,
            provider: provider.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            top_p: None,
            top_k: None,
            credential: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(SecretString::from(credential.into()));
        self
    }

    /// Parse the stored provider string. Unknown values are a configuration error.
    pub fn provider_kind(&self) -> AgentResult<ProviderKind> {
        self.provider.parse()
    }

    /// Model id as sent on the wire: trimmed, spaces replaced by hyphens
    pub fn normalized_model(&self) -> String {
        self.model.trim().replace(' ', "-")
    }

    pub fn effective_max_tokens(&self) -> u32 {
        match self.max_tokens {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => DEFAULT_MAX_TOKENS,
        }
    }

    /// System instruction for OpenAI-shaped providers
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are agent {}.\n", self.name);
        if let Some(role) = self.role.as_deref().filter(|r| !r.trim().is_empty()) {
            prompt.push_str(&format!("Role: {}\n", role));
        }
        if let Some(goal) = self.goal.as_deref().filter(|g| !g.trim().is_empty()) {
            prompt.push_str(&format!("Goal: {}\n", goal));
        }
        prompt.push_str("Respond as helpfully as possible.");
        prompt
    }

    /// Pick the credential for one call.
    ///
    /// Returns `Ok(None)` when neither level supplied anything (offline echo), and
    /// a configuration error when something was supplied but every candidate is blank.
    pub fn resolve_credential(&self, request: Option<&str>) -> AgentResult<Option<SecretString>> {
        let agent = self.credential.as_ref().map(|c| c.expose_secret());
        if request.is_none() && agent.is_none() {
            return Ok(None);
        }

        [request, agent]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(|c| Some(SecretString::from(c.to_string())))
            .ok_or_else(|| {
                AgentError::configuration(format!(
                    "No usable API key for agent '{}': request and agent credentials are both empty",
                    self.name
                ))
            })
    }
}

impl PartialEq for AgentConfig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.role == other.role
            && self.goal == other.goal
            && self.provider == other.provider
            && self.model == other.model
            && self.temperature == other.temperature
            && self.max_tokens == other.max_tokens
            && self.top_p == other.top_p
            && self.top_k == other.top_k
            && self.credential.as_ref().map(|c| c.expose_secret())
                == other.credential.as_ref().map(|c| c.expose_secret())
    }
}
