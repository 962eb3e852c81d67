//! CLI + environment configuration for the worker agent.

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "runtime-fleet-worker-agent", about = "Registration and heartbeat client for a runtime worker node")]
pub struct Config {
    /// Base URL of the proxy's management surface.
    #[arg(long, env = "OPENHANDS_PROXY_URL")]
    pub proxy_url: String,

    /// Address this worker's own runtime API is reachable at.
    #[arg(long, env = "WORKER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "WORKER_PORT", default_value_t = 9000)]
    pub port: u16,

    /// Fixed at startup; defaults to a fresh UUID if unset.
    #[arg(long, env = "WORKER_SERVER_ID")]
    pub server_id: Option<String>,

    #[arg(long, env = "WORKER_MAX_SESSIONS", default_value_t = 100)]
    pub max_sessions: u32,

    #[arg(long, env = "WORKER_HEARTBEAT_INTERVAL", default_value_t = 30)]
    pub heartbeat_interval_secs: u64,
}

impl Config {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn resolved_server_id(&self) -> String {
        self.server_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}
