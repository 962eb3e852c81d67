//! CLI + environment configuration, merged via `clap`'s `env` feature so
//! every setting has both a flag and an environment-variable fallback.

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "runtime-fleet-proxy", about = "Runtime-fleet proxy and session router")]
pub struct Config {
    /// Shared key expected from registering/heartbeating workers.
    #[arg(long, env = "OPENHANDS_PROXY_API_KEY", default_value = "default_key")]
    pub api_key: String,

    /// Seconds between heartbeat sweeps.
    #[arg(long, env = "HEALTH_CHECK_INTERVAL", default_value_t = 30)]
    pub health_check_interval: u64,

    /// Seconds of silence before a server is marked offline.
    #[arg(long, env = "SESSION_TIMEOUT", default_value_t = 3600)]
    pub session_timeout: u64,

    #[arg(long, env = "PROXY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PROXY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds since the last heartbeat before a server is culled.
    #[arg(long, default_value_t = 60)]
    pub heartbeat_timeout_secs: u64,
}

impl Config {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
