use serde::{Deserialize, Serialize};

/// Owner id used for every request when authentication is disabled
pub const ANONYMOUS_OWNER: &str = "anonymous";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: String,
}

fn default_enabled() -> bool {
    true
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            jwt_secret: None,
            jwt_algorithm: default_jwt_algorithm(),
        }
    }
}

/// Identity attached to each authenticated request
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthContext {
    pub authenticated: bool,
    pub user_id: Option<String>,
}

impl AuthContext {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            user_id: Some(user_id.into()),
        }
    }

    /// Owner key for agent lookups
    pub fn owner_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(ANONYMOUS_OWNER)
    }
}
