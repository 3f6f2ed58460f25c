use thiserror::Error;

use crate::config::{ChatSettings, ProviderSettings, ServerSettings, Settings};
use crate::domain::auth::AuthConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ValidationError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Collect every problem instead of stopping at the first
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&settings.server, &mut errors);
        Self::validate_auth(&settings.auth, &mut errors);
        Self::validate_providers(&settings.providers, &mut errors);
        Self::validate_chat(&settings.chat, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings, errors: &mut Vec<ValidationError>) {
        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::invalid("server.port", "Port must be greater than 0"));
        }
    }

    fn validate_auth(auth: &AuthConfig, errors: &mut Vec<ValidationError>) {
        if !auth.enabled {
            return;
        }

        if auth.jwt_secret.as_deref().map_or(true, |s| s.trim().is_empty()) {
            errors.push(ValidationError::MissingField("auth.jwt_secret".to_string()));
        }

        if !matches!(auth.jwt_algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            errors.push(ValidationError::invalid(
                "auth.jwt_algorithm",
                format!("Unsupported algorithm '{}'", auth.jwt_algorithm),
            ));
        }
    }

    fn validate_providers(providers: &ProviderSettings, errors: &mut Vec<ValidationError>) {
        for (field, url) in [
            ("providers.openai_base_url", &providers.openai_base_url),
            ("providers.fireworks_base_url", &providers.fireworks_base_url),
            ("providers.gemini_base_url", &providers.gemini_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ValidationError::invalid(field, "URL must start with http:// or https://"));
            }
        }

        if providers.timeout_seconds == 0 {
            errors.push(ValidationError::invalid(
                "providers.timeout_seconds",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_chat(chat: &ChatSettings, errors: &mut Vec<ValidationError>) {
        if chat.stream_chunk_chars == 0 {
            errors.push(ValidationError::invalid(
                "chat.stream_chunk_chars",
                "Chunk size must be greater than 0",
            ));
        }
    }
}
