//! Wire types shared between the proxy and worker agents.
//!
//! These types define the single source of truth for the HTTP contract
//! documented in the management surface: server registration/heartbeat
//! payloads, session records, and the response envelope every route
//! returns.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Server status ────────────────────────────────────────────────────

/// Lifecycle status of a registered runtime server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Online,
    Offline,
    Busy,
    Maintenance,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Online => write!(f, "online"),
            ServerStatus::Offline => write!(f, "offline"),
            ServerStatus::Busy => write!(f, "busy"),
            ServerStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl std::str::FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("online") {
            Ok(ServerStatus::Online)
        } else if s.eq_ignore_ascii_case("offline") {
            Ok(ServerStatus::Offline)
        } else if s.eq_ignore_ascii_case("busy") {
            Ok(ServerStatus::Busy)
        } else if s.eq_ignore_ascii_case("maintenance") {
            Ok(ServerStatus::Maintenance)
        } else {
            Err(format!("unknown server status: {s}"))
        }
    }
}

// ── Capacity ─────────────────────────────────────────────────────────

/// Point-in-time resource snapshot reported by a worker on registration
/// and every heartbeat. `last_updated` doubles as the liveness clock the
/// heartbeat checker sweeps against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,
    #[serde(default)]
    pub current_sessions: u32,
    #[serde(default)]
    pub cpu_usage: f32,
    #[serde(default)]
    pub memory_usage: f32,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

fn default_max_sessions() -> u32 {
    100
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            current_sessions: 0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            last_updated: Utc::now(),
        }
    }
}

impl Capacity {
    /// Ratio of `current_sessions` to `max_sessions`, used by the balancer
    /// to rank servers. A server with no capacity at all is reported as
    /// maximally loaded rather than dividing by zero.
    pub fn load_ratio(&self) -> f64 {
        if self.max_sessions == 0 {
            f64::INFINITY
        } else {
            self.current_sessions as f64 / self.max_sessions as f64
        }
    }
}

// ── Entities ─────────────────────────────────────────────────────────

/// A registered worker node hosting containerized runtime sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeServer {
    pub server_id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub capacity: Capacity,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RuntimeServer {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A client session bound to the server hosting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub server_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SessionInfo {
    pub fn new(session_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            server_id: server_id.into(),
            created_at: now,
            last_active: now,
            metadata: HashMap::new(),
        }
    }
}

// ── Response envelope ────────────────────────────────────────────────

/// Uniform `{"status": "success"|"error", ...}` envelope used by every
/// management-surface route.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum ApiResponse<T: Serialize> {
    #[serde(rename = "success")]
    Success {
        #[serde(flatten)]
        data: T,
    },
    #[serde(rename = "error")]
    Error { detail: String },
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse::Success { data }
    }
}

impl ApiResponse<()> {
    pub fn error(detail: impl Into<String>) -> Self {
        ApiResponse::Error {
            detail: detail.into(),
        }
    }
}
