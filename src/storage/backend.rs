use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::trace;
use crate::core::error::Result;

/// Path-addressed durable byte store (filesystem, object store, relay).
///
/// Absent paths read as `Ok(None)`; transport failures are `ErrorKind::Backend`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<Bytes>>;

    async fn write(&self, path: &str, data: Bytes) -> Result<()>;
}

/// In-process blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.blobs.get(path).map(|blob| blob.value().clone())
    }

    /// Store bytes directly, bypassing the counters
    pub fn insert(&self, path: impl Into<String>, data: Bytes) {
        self.blobs.insert(path.into(), data);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let blob = self.get(path);
        trace!(path, found = blob.is_some(), "blob read");
        Ok(blob)
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        trace!(path, len = data.len(), "blob write");
        self.blobs.insert(path.to_string(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_blob_store() {
        let store = MemoryBlobStore::new();
        assert!(store.read("a/b").await.unwrap().is_none());

        store.write("a/b", Bytes::from_static(b"xyz")).await.unwrap();
        assert_eq!(store.read("a/b").await.unwrap().unwrap(), Bytes::from_static(b"xyz"));
        assert_eq!(store.read_count(), 2);
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.len(), 1);
    }
}
