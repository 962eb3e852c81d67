//! Wires the management surface (`/servers/*`, `/sessions/*`) and the
//! catch-all proxy route onto a shared [`AppState`], following the
//! teacher's convention of a single context struct threaded through
//! `axum::extract::State`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use runtime_fleet_protocol::{ApiResponse, RuntimeServer, ServerStatus};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::ProxyError;
use crate::heartbeat::{HeartbeatChecker, HeartbeatCheckerConfig};
use crate::registry::Registry;
use crate::router::{self, SESSION_HEADER, SESSION_ID_RESPONSE_HEADER};
use crate::{balancer, forwarder};

pub struct AppState {
    pub registry: Arc<Registry>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            // Unbounded timeout by default, matching the upstream
            // collaborator's client; callers may wrap with their own
            // deadline via the `tower-http` timeout layer instead.
            http_client: reqwest::Client::new(),
        }
    }
}

/// Wires the management routes plus the catch-all proxy route.
///
/// Every management route also sets `proxy_request` as its own
/// method-mismatch fallback: axum's top-level `Router::fallback` only
/// fires when the *path* matches nothing, so a request whose path
/// matches a management route but whose method doesn't (e.g.
/// `GET /servers/register`) would otherwise hit axum's built-in 405
/// instead of the catch-all Router, per §4.5's "any other method/path is
/// handled by the Router".
pub fn build_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route(
            "/servers/register",
            post(register_server).fallback(proxy_request),
        )
        .route(
            "/servers/unregister/{server_id}",
            post(unregister_server).fallback(proxy_request),
        )
        .route("/servers", get(list_servers).fallback(proxy_request))
        .route(
            "/servers/{server_id}/heartbeat",
            post(heartbeat).fallback(proxy_request),
        )
        .route("/sessions", get(list_sessions).fallback(proxy_request))
        .route(
            "/sessions/{session_id}",
            get(get_session).fallback(proxy_request),
        )
        .fallback(any(proxy_request))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Reads the body of `request` and deserializes it as `T`, surfacing any
/// failure as `ProxyError::Validation` so it flows through the same
/// `{"status":"error",...}` envelope every other route returns instead
/// of axum's own `JsonRejection` body shape.
async fn parse_json_body<T: DeserializeOwned>(request: Request) -> Result<T, ProxyError> {
    let bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| ProxyError::Validation(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ProxyError::Validation(e.to_string()))
}

pub fn spawn_heartbeat_checker(registry: Arc<Registry>, config: HeartbeatCheckerConfig) -> HeartbeatChecker {
    HeartbeatChecker::spawn(registry, config)
}

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Serialize)]
struct Servers {
    servers: Vec<RuntimeServer>,
}

#[derive(Serialize)]
struct Sessions {
    sessions: Vec<runtime_fleet_protocol::SessionInfo>,
}

async fn register_server(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let server: RuntimeServer = match parse_json_body(request).await {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    state.registry.register_server(server);
    (
        StatusCode::OK,
        Json(ApiResponse::ok(Message {
            message: "server registered",
        })),
    )
        .into_response()
}

async fn unregister_server(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
) -> Response {
    match state.registry.unregister_server(&server_id) {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(Message {
                message: "server unregistered",
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_servers(State(state): State<Arc<AppState>>) -> Response {
    let servers = state.registry.list_servers();
    (StatusCode::OK, Json(ApiResponse::ok(Servers { servers }))).into_response()
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
    request: Request,
) -> Response {
    let payload: RuntimeServer = match parse_json_body(request).await {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    match state.registry.get_server(&server_id) {
        None => {
            let mut payload = payload;
            payload.server_id = server_id.clone();
            state.registry.register_server(payload);
            tracing::info!(server_id, "server auto-registered via heartbeat");
        }
        Some(existing) => {
            if let Err(e) = state
                .registry
                .update_server_capacity(&server_id, payload.capacity)
            {
                return e.into_response();
            }
            if existing.status == ServerStatus::Offline {
                if let Err(e) = state
                    .registry
                    .update_server_status(&server_id, ServerStatus::Online)
                {
                    return e.into_response();
                }
                tracing::info!(server_id, "server back online via heartbeat");
            }
        }
    }
    (
        StatusCode::OK,
        Json(ApiResponse::ok(Message {
            message: "heartbeat received",
        })),
    )
        .into_response()
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> Response {
    let sessions = state.registry.list_sessions();
    (StatusCode::OK, Json(ApiResponse::ok(Sessions { sessions }))).into_response()
}

async fn get_session(State(state): State<Arc<AppState>>, Path(session_id): Path<String>) -> Response {
    match state.registry.get_session(&session_id) {
        Some(session) => (StatusCode::OK, Json(ApiResponse::ok(session))).into_response(),
        None => ProxyError::UnknownSession(session_id).into_response(),
    }
}

async fn proxy_request(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    request: Request,
) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let session_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let decision = match router::route(&state.registry, session_header.as_deref()) {
        Ok(d) => d,
        Err(e) => return e.into_response(),
    };

    let body = match axum::body::to_bytes(request.into_body(), usize::MAX).await {
        Ok(b) => b,
        Err(e) => return ProxyError::Internal(e.to_string()).into_response(),
    };

    let forwarded = forwarder::forward(
        &state.http_client,
        &decision.server,
        method,
        &path_and_query,
        headers,
        body,
        Some(&peer.ip().to_string()),
    )
    .await;

    match forwarded {
        Ok(resp) => {
            let mut response = Response::builder().status(resp.status);
            for (name, value) in resp.headers.iter() {
                response = response.header(name.clone(), value.clone());
            }
            if decision.is_new_binding {
                response = response.header(SESSION_ID_RESPONSE_HEADER, decision.session_id);
            }
            response
                .body(axum::body::Body::from(resp.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => e.into_response(),
    }
}

/// Exposed so the balancer can be exercised directly from integration
/// tests without constructing a full router.
pub fn preview_balancer(state: &AppState) -> Option<RuntimeServer> {
    balancer::select_server(&state.registry.list_servers()).cloned()
}
