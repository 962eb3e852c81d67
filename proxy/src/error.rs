//! Error kinds for the registry, router, and forwarder, each mapped to
//! the HTTP status and envelope the management surface returns.

use axum::{http::StatusCode, response::IntoResponse, Json};
use runtime_fleet_protocol::ApiResponse;

/// Domain errors raised by the Registry and the components built on top
/// of it. Each variant carries the HTTP status it maps to.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid request body: {0}")]
    Validation(String),

    #[error("unknown server: {0}")]
    UnknownServer(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("session already registered: {0}")]
    DuplicateSession(String),

    #[error("no online server with available capacity")]
    NoCapacity,

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("proxy is shutting down")]
    Shutdown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
            ProxyError::UnknownServer(_) | ProxyError::UnknownSession(_) => StatusCode::NOT_FOUND,
            ProxyError::DuplicateSession(_) => StatusCode::CONFLICT,
            ProxyError::NoCapacity => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream(e) => e
                .status()
                .map(|s| StatusCode::from_u16(s.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY))
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ProxyError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error handling request");
        } else {
            tracing::warn!(error = %self, "request failed");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
