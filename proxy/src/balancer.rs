//! Pure selection function over a registry snapshot. Holds no state and
//! never mutates the registry — it only reads the snapshot it's handed.

use runtime_fleet_protocol::{RuntimeServer, ServerStatus};

/// Returns the online server with the lowest load ratio
/// (`current_sessions / max_sessions`), breaking ties by `server_id`
/// lexicographic order for determinism. Returns `None` if no server is
/// online and has nonzero capacity.
pub fn select_server(servers: &[RuntimeServer]) -> Option<&RuntimeServer> {
    servers
        .iter()
        .filter(|s| s.status == ServerStatus::Online && s.capacity.max_sessions > 0)
        .min_by(|a, b| {
            a.capacity
                .load_ratio()
                .total_cmp(&b.capacity.load_ratio())
                .then_with(|| a.server_id.cmp(&b.server_id))
        })
}
