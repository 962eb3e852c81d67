use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use worker_agent::agent::{self, AgentConfig};
use worker_agent::telemetry::SessionCounter;
use worker_agent::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let server_id = config.resolved_server_id();

    let agent_config = AgentConfig {
        server_id: server_id.clone(),
        host: config.host.clone(),
        port: config.port,
        max_sessions: config.max_sessions,
        heartbeat_interval: config.heartbeat_interval(),
    };

    let running = agent::run(&config.proxy_url, agent_config, SessionCounter::new()).await?;
    tracing::info!(server_id, "worker agent running");

    signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    running.stop().await;
    tracing::info!("worker agent stopped");
    Ok(())
}
