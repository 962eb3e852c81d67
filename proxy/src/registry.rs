//! Concurrency-safe custodian of the server table, the session table, and
//! the server→sessions index. The three collections always move
//! together, so a single `parking_lot::Mutex` guards them rather than
//! three independently-locked maps — the index must never be observed
//! out of sync with the tables it derives from.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use parking_lot::Mutex;
use runtime_fleet_protocol::{Capacity, RuntimeServer, ServerStatus, SessionInfo};

use crate::error::{ProxyError, ProxyResult};

#[derive(Default)]
struct RegistryState {
    servers: HashMap<String, RuntimeServer>,
    sessions: HashMap<String, SessionInfo>,
    server_sessions: HashMap<String, HashSet<String>>,
}

/// In-memory registry of runtime servers and the sessions bound to them.
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Inserts or replaces `server`. Idempotent: re-registering the same
    /// `server_id` overwrites capacity/status/metadata but preserves the
    /// existing session index for that id rather than resetting it.
    pub fn register_server(&self, server: RuntimeServer) {
        let mut state = self.state.lock();
        let id = server.server_id.clone();
        state.servers.insert(id.clone(), server);
        state.server_sessions.entry(id).or_default();
    }

    /// Removes the server and cascades deletion of every session bound to
    /// it. Fails if the server is unknown.
    pub fn unregister_server(&self, server_id: &str) -> ProxyResult<()> {
        let mut state = self.state.lock();
        if state.servers.remove(server_id).is_none() {
            return Err(ProxyError::UnknownServer(server_id.to_string()));
        }
        if let Some(session_ids) = state.server_sessions.remove(server_id) {
            for session_id in session_ids {
                state.sessions.remove(&session_id);
            }
        }
        Ok(())
    }

    pub fn get_server(&self, server_id: &str) -> Option<RuntimeServer> {
        self.state.lock().servers.get(server_id).cloned()
    }

    pub fn list_servers(&self) -> Vec<RuntimeServer> {
        self.state.lock().servers.values().cloned().collect()
    }

    /// Fails if `server_id` is unknown. Does not touch `capacity`.
    pub fn update_server_status(&self, server_id: &str, status: ServerStatus) -> ProxyResult<()> {
        let mut state = self.state.lock();
        let server = state
            .servers
            .get_mut(server_id)
            .ok_or_else(|| ProxyError::UnknownServer(server_id.to_string()))?;
        if server.status != status {
            tracing::info!(server_id, from = %server.status, to = %status, "server status transition");
        }
        server.status = status;
        Ok(())
    }

    /// Overwrites `capacity` in place, bumping the liveness clock.
    pub fn update_server_capacity(&self, server_id: &str, capacity: Capacity) -> ProxyResult<()> {
        let mut state = self.state.lock();
        let server = state
            .servers
            .get_mut(server_id)
            .ok_or_else(|| ProxyError::UnknownServer(server_id.to_string()))?;
        server.capacity = capacity;
        Ok(())
    }

    /// Requires `sess.server_id` to reference an existing server.
    /// Rejects a session id that is already registered.
    pub fn register_session(&self, sess: SessionInfo) -> ProxyResult<()> {
        let mut state = self.state.lock();
        if !state.servers.contains_key(&sess.server_id) {
            return Err(ProxyError::UnknownServer(sess.server_id.clone()));
        }
        if state.sessions.contains_key(&sess.session_id) {
            return Err(ProxyError::DuplicateSession(sess.session_id.clone()));
        }
        state
            .server_sessions
            .entry(sess.server_id.clone())
            .or_default()
            .insert(sess.session_id.clone());
        state.sessions.insert(sess.session_id.clone(), sess);
        Ok(())
    }

    pub fn unregister_session(&self, session_id: &str) -> ProxyResult<()> {
        let mut state = self.state.lock();
        let sess = state
            .sessions
            .remove(session_id)
            .ok_or_else(|| ProxyError::UnknownSession(session_id.to_string()))?;
        if let Some(ids) = state.server_sessions.get_mut(&sess.server_id) {
            ids.remove(session_id);
        }
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> Option<SessionInfo> {
        self.state.lock().sessions.get(session_id).cloned()
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.state.lock().sessions.values().cloned().collect()
    }

    pub fn get_sessions_by_server(&self, server_id: &str) -> Vec<SessionInfo> {
        let state = self.state.lock();
        state
            .server_sessions
            .get(server_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.sessions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bumps `last_active` to now for an existing session. Used by the
    /// Router on every proxied request.
    pub fn touch_session(&self, session_id: &str) -> ProxyResult<()> {
        let mut state = self.state.lock();
        let sess = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ProxyError::UnknownSession(session_id.to_string()))?;
        sess.last_active = Utc::now();
        Ok(())
    }
}
