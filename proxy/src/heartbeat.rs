//! Background sweep that marks silent servers offline.
//!
//! A `JoinHandle` paired with an `Arc<Notify>` so shutdown is a single
//! `notify_one()` plus an await, racing the sweep's sleep against that
//! notification rather than waiting out a full interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use runtime_fleet_protocol::ServerStatus;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::registry::Registry;

/// Invoked once per server transitioned to offline during a sweep.
pub type OfflineHook = Arc<dyn Fn(&str) + Send + Sync>;

pub struct HeartbeatCheckerConfig {
    pub heartbeat_timeout: Duration,
    pub check_interval: Duration,
}

impl Default for HeartbeatCheckerConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(60),
            check_interval: Duration::from_secs(30),
        }
    }
}

/// Owns the background sweep task and its cancellation signal.
pub struct HeartbeatChecker {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl HeartbeatChecker {
    pub fn spawn(registry: Arc<Registry>, config: HeartbeatCheckerConfig) -> Self {
        Self::spawn_with_hook(registry, config, Arc::new(|_server_id: &str| {}))
    }

    pub fn spawn_with_hook(
        registry: Arc<Registry>,
        config: HeartbeatCheckerConfig,
        on_offline: OfflineHook,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let task_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            run(registry, config, on_offline, task_shutdown).await;
        });
        Self { handle, shutdown }
    }

    /// Signals the sweep loop to stop and waits for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "heartbeat checker task panicked during shutdown");
        }
    }
}

async fn run(
    registry: Arc<Registry>,
    config: HeartbeatCheckerConfig,
    on_offline: OfflineHook,
    shutdown: Arc<Notify>,
) {
    loop {
        sweep(&registry, config.heartbeat_timeout, &on_offline);

        tokio::select! {
            _ = tokio::time::sleep(config.check_interval) => {}
            _ = shutdown.notified() => {
                tracing::debug!("heartbeat checker stopping");
                return;
            }
        }
    }
}

fn sweep(registry: &Registry, heartbeat_timeout: Duration, on_offline: &OfflineHook) {
    let now = Utc::now();
    for server in registry.list_servers() {
        if server.status == ServerStatus::Offline {
            continue;
        }
        let elapsed = now.signed_duration_since(server.capacity.last_updated);
        let timed_out = elapsed
            .to_std()
            .map(|d| d > heartbeat_timeout)
            .unwrap_or(false);
        if timed_out {
            tracing::warn!(server_id = %server.server_id, "heartbeat timed out, marking offline");
            if let Err(e) = registry.update_server_status(&server.server_id, ServerStatus::Offline) {
                tracing::error!(server_id = %server.server_id, error = %e, "failed to mark server offline");
                continue;
            }
            on_offline(&server.server_id);
        }
    }
}
