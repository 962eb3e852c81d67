//! Registration → heartbeat-loop → unregister state machine, grounded on
//! the upstream collaborator's `RuntimeRegistrationClient` with two
//! deliberate amendments: heartbeat failures never cause the loop to
//! exit (the Proxy side owns liveness policy), and teardown failures are
//! only logged, never re-raised — the collaborator this is modeled on
//! re-raises after logging, which would leave a half-torn-down worker
//! process in an inconsistent state.

use std::sync::Arc;

use reqwest::Client;
use runtime_fleet_protocol::{Capacity, RuntimeServer, ServerStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{AgentError, AgentResult};
use crate::telemetry::{SessionCounter, TelemetrySampler};

/// Thin client for the three calls a worker makes against the proxy's
/// management surface.
#[derive(Clone)]
pub struct RegistrationClient {
    http: Client,
    proxy_url: String,
}

impl RegistrationClient {
    pub fn new(proxy_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            proxy_url: proxy_url.into(),
        }
    }

    pub async fn register(&self, server: &RuntimeServer) -> AgentResult<()> {
        let resp = self
            .http
            .post(format!("{}/servers/register", self.proxy_url))
            .json(server)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AgentError::RegistrationFailed(resp.status()));
        }
        Ok(())
    }

    pub async fn heartbeat(&self, server_id: &str, server: &RuntimeServer) -> AgentResult<()> {
        let resp = self
            .http
            .post(format!("{}/servers/{server_id}/heartbeat", self.proxy_url))
            .json(server)
            .send()
            .await?;
        if !resp.status().is_success() {
            tracing::warn!(server_id, status = %resp.status(), "heartbeat rejected by proxy");
        }
        Ok(())
    }

    pub async fn unregister(&self, server_id: &str) -> AgentResult<()> {
        let resp = self
            .http
            .post(format!("{}/servers/unregister/{server_id}", self.proxy_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            tracing::warn!(server_id, status = %resp.status(), "unregister rejected by proxy");
        }
        Ok(())
    }
}

pub struct AgentConfig {
    pub server_id: String,
    pub host: String,
    pub port: u16,
    pub max_sessions: u32,
    pub heartbeat_interval: std::time::Duration,
}

impl AgentConfig {
    fn runtime_server(&self, capacity: Capacity) -> RuntimeServer {
        RuntimeServer {
            server_id: self.server_id.clone(),
            host: self.host.clone(),
            port: self.port,
            status: ServerStatus::Online,
            capacity,
            metadata: Default::default(),
        }
    }
}

/// A running agent: the heartbeat task plus what's needed to tear it
/// down cleanly.
pub struct RunningAgent {
    client: RegistrationClient,
    config: AgentConfig,
    task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl RunningAgent {
    /// Registers with the proxy, then spawns the heartbeat loop.
    /// Fails with `RegistrationFailed`/`Transport` if the initial
    /// registration does not succeed (Init never reaches Running).
    pub async fn start(
        client: RegistrationClient,
        config: AgentConfig,
        sessions: SessionCounter,
    ) -> AgentResult<Self> {
        let mut sampler = TelemetrySampler::new(config.max_sessions, sessions);
        let initial = config.runtime_server(sampler.sample());
        client.register(&initial).await?;
        tracing::info!(server_id = %config.server_id, "registered with proxy");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let loop_client = client.clone();
        let server_id = config.server_id.clone();
        let host = config.host.clone();
        let port = config.port;
        let interval = config.heartbeat_interval;

        let task = tokio::spawn(heartbeat_loop(
            loop_client,
            server_id,
            host,
            port,
            interval,
            sampler,
            shutdown_rx,
        ));

        Ok(Self {
            client,
            config,
            task,
            shutdown_tx,
        })
    }

    /// Stops the heartbeat loop and unregisters. Any failure during
    /// teardown is logged, never propagated — a worker shutting down
    /// must not get stuck on a proxy that is unreachable.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "heartbeat task panicked during shutdown");
        }
        if let Err(e) = self.client.unregister(&self.config.server_id).await {
            tracing::warn!(server_id = %self.config.server_id, error = %e, "unregister failed during teardown");
        }
    }
}

async fn heartbeat_loop(
    client: RegistrationClient,
    server_id: String,
    host: String,
    port: u16,
    interval: std::time::Duration,
    mut sampler: TelemetrySampler,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => {
                tracing::debug!(server_id, "heartbeat loop stopping");
                return;
            }
        }

        let server = RuntimeServer {
            server_id: server_id.clone(),
            host: host.clone(),
            port,
            status: ServerStatus::Online,
            capacity: sampler.sample(),
            metadata: Default::default(),
        };

        match client.heartbeat(&server_id, &server).await {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(server_id, error = %e, "heartbeat transport error");
            }
        }
    }
}

/// Convenience wrapper bundling client construction with start, mirroring
/// the single-entry-point shape of the upstream collaborator's
/// `RuntimeRegistrationClient.start()`.
pub async fn run(
    proxy_url: &str,
    config: AgentConfig,
    sessions: SessionCounter,
) -> AgentResult<RunningAgent> {
    let client = RegistrationClient::new(proxy_url.to_string());
    RunningAgent::start(client, config, sessions).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    async fn spawn_fake_proxy() -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let register_hits = StdArc::new(AtomicUsize::new(0));
        let heartbeat_hits = StdArc::new(AtomicUsize::new(0));

        let r = register_hits.clone();
        let h = heartbeat_hits.clone();

        let app = Router::new()
            .route(
                "/servers/register",
                post(move |Json(_): Json<serde_json::Value>| {
                    let r = r.clone();
                    async move {
                        r.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({"status": "success"}))
                    }
                }),
            )
            .route(
                "/servers/{server_id}/heartbeat",
                post(move |Json(_): Json<serde_json::Value>| {
                    let h = h.clone();
                    async move {
                        h.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({"status": "success"}))
                    }
                }),
            )
            .route(
                "/servers/unregister/{server_id}",
                post(|| async { Json(serde_json::json!({"status": "success"})) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), register_hits, heartbeat_hits)
    }

    #[tokio::test]
    async fn start_registers_once_before_returning() {
        let (url, register_hits, _heartbeat_hits) = spawn_fake_proxy().await;
        let client = RegistrationClient::new(url);
        let config = AgentConfig {
            server_id: "w1".into(),
            host: "127.0.0.1".into(),
            port: 9000,
            max_sessions: 10,
            heartbeat_interval: std::time::Duration::from_millis(50),
        };
        let agent = RunningAgent::start(client, config, SessionCounter::new())
            .await
            .unwrap();
        assert_eq!(register_hits.load(Ordering::SeqCst), 1);
        agent.stop().await;
    }

    #[tokio::test]
    async fn heartbeat_loop_ticks_and_stops_promptly() {
        let (url, _register_hits, heartbeat_hits) = spawn_fake_proxy().await;
        let client = RegistrationClient::new(url);
        let config = AgentConfig {
            server_id: "w1".into(),
            host: "127.0.0.1".into(),
            port: 9000,
            max_sessions: 10,
            heartbeat_interval: std::time::Duration::from_millis(20),
        };
        let agent = RunningAgent::start(client, config, SessionCounter::new())
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let start = std::time::Instant::now();
        agent.stop().await;
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
        assert!(heartbeat_hits.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn registration_against_unreachable_proxy_fails_fast() {
        let client = RegistrationClient::new("http://127.0.0.1:1");
        let config = AgentConfig {
            server_id: "w1".into(),
            host: "127.0.0.1".into(),
            port: 9000,
            max_sessions: 10,
            heartbeat_interval: std::time::Duration::from_secs(30),
        };
        let result = RunningAgent::start(client, config, SessionCounter::new()).await;
        assert!(result.is_err());
    }
}
