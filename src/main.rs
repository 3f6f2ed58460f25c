use agentdesk::cli::Cli;
use agentdesk::config::Settings;
use agentdesk::persistence::InMemoryRepository;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agentdesk=info,tower_http=info")),
        )
        .init();

    let settings = Settings::new_with_cli(&cli)?;
    let host = settings.server.host.clone();
    let port = settings.server.port;

    info!(
        auth_enabled = settings.auth.enabled,
        offline_echo = settings.chat.offline_echo,
        "Starting agentdesk on {}:{}",
        host,
        port
    );

    let repository = Arc::new(InMemoryRepository::new());
    let service = agentdesk::create_service(&settings, repository);
    let app = agentdesk::create_app(&settings, service);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
