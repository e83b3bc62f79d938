//! [`BlobStore`] over the `object_store` crate.
//!
//! A library is a flat set of immutable objects under one prefix: the
//! `<bucket>.lps` shards, then `info.json`, which is written last and marks
//! the library complete. Builds never overwrite or delete an object.

use crate::storage::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{local::LocalFileSystem, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Library storage on any `object_store` backend.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    /// Wrap an existing store, e.g. a remote bucket.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Store libraries under the local directory `path`, creating it if needed.
    pub fn local(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)
            .map_err(|e| StorageError::Io(format!("failed to create directory: {}", e)))?;

        let store = LocalFileSystem::new_with_prefix(&path)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            store: Arc::new(store),
        })
    }
}

fn map_error(path: &str, e: object_store::Error) -> StorageError {
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound(path.to_string()),
        _ => StorageError::Backend(format!("{}: {}", path, e)),
    }
}

fn location(path: &str) -> object_store::path::Path {
    object_store::path::Path::from(path)
}

#[async_trait]
impl BlobStore for ObjectStoreBackend {
    async fn get(&self, path: &str) -> StorageResult<Bytes> {
        let result = self
            .store
            .get(&location(path))
            .await
            .map_err(|e| map_error(path, e))?;
        result.bytes().await.map_err(|e| map_error(path, e))
    }

    async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        self.store
            .put(&location(path), data.into())
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(())
    }

    /// Every object under `prefix`. A prefix with nothing under it lists empty.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix_path = (!prefix.is_empty()).then(|| location(prefix));
        self.store
            .list(prefix_path.as_ref())
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .map_err(|e| map_error(prefix, e))
    }
}

/// Local directory backend, as used by [`crate::build`] and [`crate::lookup`].
pub fn local(path: impl Into<PathBuf>) -> StorageResult<ObjectStoreBackend> {
    ObjectStoreBackend::local(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_put_get() {
        let tmp = TempDir::new().unwrap();
        let store = local(tmp.path()).unwrap();

        let data = Bytes::from_static(&[3, b'c', b'a', b't']);
        store.put("3829.lps", data.clone()).await.unwrap();

        assert_eq!(store.get("3829.lps").await.unwrap(), data);
        assert!(tmp.path().join("3829.lps").exists());
    }

    #[tokio::test]
    async fn test_local_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = local(tmp.path()).unwrap();

        let result = store.get("17.lps").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_list() {
        let tmp = TempDir::new().unwrap();
        let store = local(tmp.path()).unwrap();

        store.put("en/1.lps", Bytes::from("a")).await.unwrap();
        store.put("en/2.lps", Bytes::from("b")).await.unwrap();
        store.put("fr/1.lps", Bytes::from("c")).await.unwrap();

        let mut files = store.list("en").await.unwrap();
        files.sort();
        assert_eq!(files, vec!["en/1.lps".to_string(), "en/2.lps".to_string()]);
    }

    #[tokio::test]
    async fn test_list_unknown_prefix_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = local(tmp.path()).unwrap();

        assert!(store.list("").await.unwrap().is_empty());
        assert!(store.list("en").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_backend() {
        let store = ObjectStoreBackend::new(Arc::new(object_store::memory::InMemory::new()));

        store.put("en/info.json", Bytes::from("{}")).await.unwrap();
        assert_eq!(store.get("en/info.json").await.unwrap(), Bytes::from("{}"));
        assert_eq!(store.list("en").await.unwrap(), vec!["en/info.json".to_string()]);
        assert!(matches!(
            store.get("en/3829.lps").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
