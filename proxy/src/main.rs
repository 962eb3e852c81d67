use std::sync::Arc;

use clap::Parser;
use proxy::heartbeat::HeartbeatCheckerConfig;
use proxy::http::{build_router, AppState};
use proxy::{Config, Registry};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let registry = Arc::new(Registry::new());

    let heartbeat_checker = proxy::http::spawn_heartbeat_checker(
        registry.clone(),
        HeartbeatCheckerConfig {
            heartbeat_timeout: config.heartbeat_timeout(),
            check_interval: config.check_interval(),
        },
    );

    let state = Arc::new(AppState::new(registry));
    let app = build_router(state, std::time::Duration::from_secs(300));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "proxy listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    heartbeat_checker.shutdown().await;
    tracing::info!("proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
