//! Narrow interface onto the container-runtime driver that actually
//! creates/pauses/resumes sandbox containers. Left unimplemented here —
//! it is an external collaborator outside this system's core — so a
//! real driver (or an in-memory fake for tests) can be plugged in by the
//! embedding process.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("runtime {0} not found")]
    NotFound(String),
    #[error("driver operation failed: {0}")]
    Failed(String),
}

/// Lifecycle operations on a single sandboxed runtime, identified by an
/// opaque id chosen by the caller.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    async fn create(&self, id: &str) -> Result<(), DriverError>;
    async fn connect(&self, id: &str) -> Result<(), DriverError>;
    async fn pause(&self, id: &str) -> Result<(), DriverError>;
    async fn resume(&self, id: &str) -> Result<(), DriverError>;
    async fn delete(&self, id: &str) -> Result<(), DriverError>;
}
