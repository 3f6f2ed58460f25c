use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod validator;

use crate::agents::llm::{ProviderClient, ProviderEndpoints, StreamPacing};
use crate::cli::Cli;
use crate::domain::auth::AuthConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub providers: ProviderSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Allow any origin, method, and header
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_permissive: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Provider endpoints and the per-request timeout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    pub openai_base_url: String,
    pub fireworks_base_url: String,
    pub gemini_base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        let endpoints = ProviderEndpoints::default();
        Self {
            openai_base_url: endpoints.openai_base_url,
            fireworks_base_url: endpoints.fireworks_base_url,
            gemini_base_url: endpoints.gemini_base_url,
            timeout_seconds: 60,
        }
    }
}

impl ProviderSettings {
    pub fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints {
            openai_base_url: self.openai_base_url.clone(),
            fireworks_base_url: self.fireworks_base_url.clone(),
            gemini_base_url: self.gemini_base_url.clone(),
        }
    }

    pub fn client(&self) -> ProviderClient {
        ProviderClient::new(self.endpoints(), Duration::from_secs(self.timeout_seconds))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatSettings {
    /// Route agents without an API key to the local echo instead of rejecting
    pub offline_echo: bool,
    pub stream_chunk_chars: usize,
    pub stream_chunk_delay_ms: u64,
    pub echo_delay_ms: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        let pacing = StreamPacing::default();
        Self {
            offline_echo: false,
            stream_chunk_chars: pacing.chunk_chars,
            stream_chunk_delay_ms: pacing.chunk_delay.as_millis() as u64,
            echo_delay_ms: pacing.echo_delay.as_millis() as u64,
        }
    }
}

impl ChatSettings {
    pub fn pacing(&self) -> StreamPacing {
        StreamPacing {
            chunk_chars: self.stream_chunk_chars,
            chunk_delay: Duration::from_millis(self.stream_chunk_delay_ms),
            echo_delay: Duration::from_millis(self.echo_delay_ms),
        }
    }
}

impl Settings {
    /// Create settings from CLI arguments (config file, then CLI/env overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::load_file(&cli.config)?;
        settings.apply_cli_overrides(cli);
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from an optional TOML file
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let settings = Self::load_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load_file(path: &Path) -> Result<Self, anyhow::Error> {
        let defaults = Settings::default();
        let s = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.cors_permissive", defaults.server.cors_permissive)?
            .set_default("auth.enabled", defaults.auth.enabled)?
            .set_default("auth.jwt_algorithm", defaults.auth.jwt_algorithm)?
            .set_default("providers.openai_base_url", defaults.providers.openai_base_url)?
            .set_default("providers.fireworks_base_url", defaults.providers.fireworks_base_url)?
            .set_default("providers.gemini_base_url", defaults.providers.gemini_base_url)?
            .set_default("providers.timeout_seconds", defaults.providers.timeout_seconds as i64)?
            .set_default("chat.offline_echo", defaults.chat.offline_echo)?
            .set_default("chat.stream_chunk_chars", defaults.chat.stream_chunk_chars as i64)?
            .set_default("chat.stream_chunk_delay_ms", defaults.chat.stream_chunk_delay_ms as i64)?
            .set_default("chat.echo_delay_ms", defaults.chat.echo_delay_ms as i64)?
            .add_source(File::from(path.to_path_buf()).required(false))
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(secret) = &cli.jwt_secret {
            self.auth.jwt_secret = Some(secret.clone());
        }
        if let Some(offline_echo) = cli.offline_echo {
            self.chat.offline_echo = offline_echo;
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "agentdesk",
            "--config",
            dir.path().join("absent.toml").to_str().unwrap(),
            "--jwt-secret",
            "s",
        ]);
        let settings = Settings::new_with_cli(&cli).unwrap();

        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8000);
        assert!(settings.server.cors_permissive);
        assert!(settings.auth.enabled);
        assert_eq!(settings.auth.jwt_algorithm, "HS256");
        assert_eq!(settings.providers.timeout_seconds, 60);
        assert_eq!(settings.providers.openai_base_url, "https://api.openai.com/v1");
        assert!(!settings.chat.offline_echo);
        assert_eq!(settings.chat.pacing(), StreamPacing::default());
    }

    #[test]
    fn test_file_values_and_cli_overrides() {
        let file = write_config(
            r#"
[server]
host = "0.0.0.0"
port = 9000

[auth]
jwt_secret = "from-file"

[providers]
openai_base_url = "http://localhost:1234/v1"
timeout_seconds = 5

[chat]
stream_chunk_chars = 8
"#,
        );

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.auth.jwt_secret.as_deref(), Some("from-file"));
        assert_eq!(settings.providers.endpoints().openai_base_url, "http://localhost:1234/v1");
        assert_eq!(
            settings.providers.fireworks_base_url,
            "https://api.fireworks.ai/inference/v1"
        );
        assert_eq!(settings.chat.pacing().chunk_chars, 8);

        let cli = Cli::parse_from([
            "agentdesk",
            "--config",
            file.path().to_str().unwrap(),
            "--port",
            "9100",
            "--offline-echo",
        ]);
        let settings = Settings::new_with_cli(&cli).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert!(settings.chat.offline_echo);
    }

    #[test]
    fn test_invalid_file_reports_every_problem() {
        let file = write_config(
            r#"
[providers]
gemini_base_url = "generativelanguage.googleapis.com"
timeout_seconds = 0

[chat]
stream_chunk_chars = 0
"#,
        );

        let err = Settings::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("auth.jwt_secret"));
        assert!(err.contains("providers.gemini_base_url"));
        assert!(err.contains("providers.timeout_seconds"));
        assert!(err.contains("chat.stream_chunk_chars"));
    }
}
