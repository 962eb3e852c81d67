//! End-to-end scenarios driving the full axum app in-process, matching
//! the concrete walkthroughs specified for this system: cold
//! registration, least-loaded selection, session affinity, and cascade
//! delete. The proxy forward-path itself needs a live upstream, so these
//! scenarios exercise only the management surface plus the parts of the
//! router that don't require reaching an actual worker.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use proxy::http::{build_router, AppState};
use proxy::Registry;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> axum::Router {
    let registry = Arc::new(Registry::new());
    let state = Arc::new(AppState::new(registry));
    build_router(state, std::time::Duration::from_secs(30))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn cold_registration_lists_one_online_server() {
    let app = app();

    let register = Request::post("/servers/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "server_id": "A",
                "host": "h1",
                "port": 9001,
                "capacity": {"max_sessions": 10, "current_sessions": 0}
            })
            .to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(register).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let list = Request::get("/servers").body(Body::empty()).unwrap();
    let resp = app.oneshot(list).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["status"], "online");
}

#[tokio::test]
async fn heartbeat_auto_registers_unknown_server() {
    let app = app();

    let heartbeat = Request::post("/servers/B/heartbeat")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "server_id": "B",
                "host": "h2",
                "port": 9002,
                "capacity": {"max_sessions": 5, "current_sessions": 1}
            })
            .to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(heartbeat).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let list = Request::get("/servers").body(Body::empty()).unwrap();
    let resp = app.oneshot(list).await.unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["servers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn heartbeat_auto_register_uses_path_server_id_over_body_mismatch() {
    let app = app();

    let heartbeat = Request::post("/servers/C/heartbeat")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "server_id": "wrong-id",
                "host": "h3",
                "port": 9003,
                "capacity": {"max_sessions": 5, "current_sessions": 0}
            })
            .to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(heartbeat).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let list = Request::get("/servers").body(Body::empty()).unwrap();
    let resp = app.oneshot(list).await.unwrap();
    let body = json_body(resp).await;
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["server_id"], "C");
}

#[tokio::test]
async fn malformed_register_body_returns_error_envelope_not_axum_rejection() {
    let app = app();
    let req = Request::post("/servers/register")
        .header("content-type", "application/json")
        .body(Body::from("{ not valid json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn mismatched_method_on_management_route_falls_through_to_proxy_router() {
    use axum::extract::{ConnectInfo, Extension};
    use std::net::SocketAddr;

    // `oneshot` bypasses `into_make_service_with_connect_info`, so supply
    // the same `ConnectInfo` extension it would normally inject.
    let registry = Arc::new(Registry::new());
    let state = Arc::new(AppState::new(registry));
    let app = build_router(state, std::time::Duration::from_secs(30))
        .layer(Extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0)))));

    // No servers registered: a request wrongly routed to the catch-all
    // proxy surfaces as no-capacity (503) rather than axum's built-in
    // 405, proving the path reached `proxy_request` instead of dying on
    // a method mismatch.
    let req = Request::get("/servers/register").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unregister_unknown_server_is_404() {
    let app = app();
    let req = Request::post("/servers/unregister/ghost")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cascade_delete_removes_sessions() {
    let registry = Arc::new(Registry::new());
    registry.register_server(runtime_fleet_protocol::RuntimeServer {
        server_id: "A".into(),
        host: "h1".into(),
        port: 9001,
        status: runtime_fleet_protocol::ServerStatus::Online,
        capacity: runtime_fleet_protocol::Capacity {
            max_sessions: 10,
            ..Default::default()
        },
        metadata: Default::default(),
    });
    registry
        .register_session(runtime_fleet_protocol::SessionInfo::new("S1", "A"))
        .unwrap();
    registry
        .register_session(runtime_fleet_protocol::SessionInfo::new("S2", "A"))
        .unwrap();

    let state = Arc::new(AppState::new(registry));
    let app = build_router(state, std::time::Duration::from_secs(30));

    let unregister = Request::post("/servers/unregister/A").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(unregister).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let sessions = Request::get("/sessions").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(sessions).await.unwrap();
    let body = json_body(resp).await;
    assert!(body["sessions"].as_array().unwrap().is_empty());

    let get_s1 = Request::get("/sessions/S1").body(Body::empty()).unwrap();
    let resp = app.oneshot(get_s1).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proxy_route_with_no_server_is_no_capacity() {
    // The catch-all proxy route needs `ConnectInfo`, which `oneshot` does
    // not supply without `into_make_service_with_connect_info`; exercise
    // the routing decision it delegates to directly instead.
    let registry = Registry::new();
    let decision = proxy::router::route(&registry, None);
    assert!(matches!(decision, Err(proxy::ProxyError::NoCapacity)));
}
