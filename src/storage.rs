//! Storage abstraction for vector libraries.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found in storage.
    #[error("object not found: {0}")]
    NotFound(String),

    /// I/O error during storage operation.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Error from the underlying storage backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Abstraction over blob storage backends.
///
/// Shard files are written once and never modified, so implementations need
/// no coordination between concurrent readers.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read an entire object.
    async fn get(&self, path: &str) -> StorageResult<Bytes>;

    /// Write data to an object (overwrites if exists).
    async fn put(&self, path: &str, data: Bytes) -> StorageResult<()>;

    /// List objects with a given prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Join a library prefix and an object name.
pub fn object_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
