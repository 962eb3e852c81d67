//! Maps an incoming proxied request to a target server: session
//! affinity first, balancer fallback second, creating a new binding
//! when none existed.

use runtime_fleet_protocol::{RuntimeServer, ServerStatus, SessionInfo};
use uuid::Uuid;

use crate::balancer;
use crate::error::{ProxyError, ProxyResult};
use crate::registry::Registry;

/// Header carrying the session identifier on inbound proxied requests,
/// matching the upstream collaborator's established convention.
pub const SESSION_HEADER: &str = "session_id";

/// Response header the new-session-id amendment echoes the synthesized
/// id back through (open question #1).
pub const SESSION_ID_RESPONSE_HEADER: &str = "x-session-id";

pub struct RouteDecision {
    pub server: RuntimeServer,
    pub session_id: String,
    /// True if `session_id` was absent or unbound and a fresh binding was
    /// created for this request.
    pub is_new_binding: bool,
}

/// Resolves the target server for a proxied request carrying
/// `session_id_header` (may be `None` if the header was absent).
///
/// An `offline` bound server is treated as if no binding existed (an
/// explicit correctness amendment over the upstream collaborator, which
/// never checks status on the affinity path).
pub fn route(registry: &Registry, session_id_header: Option<&str>) -> ProxyResult<RouteDecision> {
    if let Some(session_id) = session_id_header {
        if let Some(session) = registry.get_session(session_id) {
            if let Some(server) = registry.get_server(&session.server_id) {
                if server.status != ServerStatus::Offline {
                    registry.touch_session(session_id)?;
                    return Ok(RouteDecision {
                        server,
                        session_id: session_id.to_string(),
                        is_new_binding: false,
                    });
                }
            }
        }
    }

    let servers = registry.list_servers();
    let chosen = balancer::select_server(&servers)
        .cloned()
        .ok_or(ProxyError::NoCapacity)?;

    // A missing header gets a synthesized id (open question #1); a
    // present-but-unbound header is reused as the new binding's id.
    let session_id = session_id_header
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    registry.register_session(SessionInfo::new(session_id.clone(), chosen.server_id.clone()))?;

    Ok(RouteDecision {
        server: chosen,
        session_id,
        is_new_binding: true,
    })
}
