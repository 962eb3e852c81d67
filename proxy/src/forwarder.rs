//! Rewrites headers, issues the upstream call, and relays the response
//! verbatim: status, headers, and body bytes, unlike the upstream
//! collaborator this proxy is modeled on, which parses and re-encodes
//! the upstream body as JSON.

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Client;
use runtime_fleet_protocol::RuntimeServer;

use crate::error::ProxyResult;

pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Builds the upstream URL, preserving the original path and query
/// string, for `server`.
pub fn target_url(server: &RuntimeServer, path_and_query: &str) -> String {
    let path_and_query = path_and_query.trim_start_matches('/');
    format!("{}/{}", server.base_url(), path_and_query)
}

/// Issues the request against `server` and relays the raw response.
/// `peer_addr` is used for `X-Forwarded-For` only when the inbound
/// request did not already carry one.
pub async fn forward(
    client: &Client,
    server: &RuntimeServer,
    method: Method,
    path_and_query: &str,
    mut headers: HeaderMap,
    body: Bytes,
    peer_addr: Option<&str>,
) -> ProxyResult<ForwardedResponse> {
    let url = target_url(server, path_and_query);

    if !headers.contains_key("x-forwarded-for") {
        if let Some(addr) = peer_addr {
            if let Ok(value) = HeaderValue::from_str(addr) {
                headers.insert(HeaderName::from_static("x-forwarded-for"), value);
            }
        }
    }
    headers.remove("host");
    headers.remove("content-length");

    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let response = client
        .request(reqwest_method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    Ok(ForwardedResponse {
        status,
        headers,
        body,
    })
}
