use clap::Parser;
use std::path::PathBuf;

/// Multi-tenant chat backend for LLM agents
#[derive(Parser, Debug, Clone)]
#[command(name = "agentdesk", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "AGENTDESK_CONFIG", default_value = "agentdesk.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "AGENTDESK_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "AGENTDESK_PORT")]
    pub port: Option<u16>,

    /// Secret used to verify bearer tokens
    #[arg(long, env = "AGENTDESK_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Answer with the local echo when an agent has no API key
    #[arg(long, env = "AGENTDESK_OFFLINE_ECHO", num_args = 0..=1, default_missing_value = "true")]
    pub offline_echo: Option<bool>,
}
