//! Capacity telemetry sampled once per heartbeat tick.
//!
//! The upstream collaborator reads `psutil.cpu_percent()` and
//! `psutil.virtual_memory().percent`; the ecosystem equivalent here is
//! `sysinfo`. Unlike that collaborator, which hardcodes
//! `current_sessions = 0` with a comment noting it was never wired up,
//! this tracks an actual live count via a shared counter the embedding
//! process increments/decrements as sessions open and close.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use runtime_fleet_protocol::Capacity;
use sysinfo::System;

/// Shared, cheaply-cloneable counter of sessions currently hosted by
/// this worker. The embedding runtime increments it on session start and
/// decrements it on session end; telemetry sampling only reads it.
#[derive(Clone, Default)]
pub struct SessionCounter(Arc<AtomicUsize>);

impl SessionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed) as u32
    }
}

pub struct TelemetrySampler {
    system: System,
    max_sessions: u32,
    sessions: SessionCounter,
}

impl TelemetrySampler {
    pub fn new(max_sessions: u32, sessions: SessionCounter) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system,
            max_sessions,
            sessions,
        }
    }

    /// Refreshes the underlying OS counters and returns a fresh
    /// `Capacity` snapshot with `last_updated = now`.
    pub fn sample(&mut self) -> Capacity {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let cpu_usage = self.system.global_cpu_usage();
        let memory_usage = if self.system.total_memory() > 0 {
            self.system.used_memory() as f32 / self.system.total_memory() as f32 * 100.0
        } else {
            0.0
        };

        Capacity {
            max_sessions: self.max_sessions,
            current_sessions: self.sessions.get(),
            cpu_usage,
            memory_usage,
            last_updated: chrono::Utc::now(),
        }
    }
}
