//! Narrow interface onto the filesystem-backed state store used for
//! crash recovery of runtime bookkeeping. An external collaborator, not
//! implemented here beyond the trait and an in-memory fake for tests.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("store operation failed: {0}")]
    Failed(String),
}

/// A JSON-serialized runtime-id table, addressed by path.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;
    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}
