pub mod backend;
pub mod null;
pub mod local;
pub mod sequenced;
pub mod persistent;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use async_trait::async_trait;
use crate::core::config::StorageConfig;
use crate::core::error::Result;
use crate::core::types::LogId;
use crate::index::log_index::LogIndex;
use crate::log::chunk::LogChunk;

pub use backend::{BlobStore, MemoryBlobStore};
pub use local::LocalLogStorage;
pub use null::NullLogStorage;
pub use persistent::PersistentLogStorage;
pub use sequenced::SequencedLogStorage;

/// Read/write access to stored log chunks and indexes.
///
/// A missing item is `Ok(None)`, never an error. Layers wrap one another, each
/// owning the next one down.
#[async_trait]
pub trait LogStorage: Send + Sync {
    /// Index covering the first `length` bytes of a log
    async fn read_index(&self, log_id: LogId, length: u64) -> Result<Option<Arc<LogIndex>>>;

    async fn write_index(&self, log_id: LogId, length: u64, index: Arc<LogIndex>) -> Result<()>;

    /// Chunk starting at byte `offset`, whose first line is `line_index`
    async fn read_chunk(
        &self,
        log_id: LogId,
        offset: u64,
        line_index: usize,
    ) -> Result<Option<Arc<LogChunk>>>;

    async fn write_chunk(&self, log_id: LogId, offset: u64, chunk: Arc<LogChunk>) -> Result<()>;
}

/// Standard layering: local cache over request coalescing over the blob backend.
/// Without a backend, the cache sits over a store that holds nothing.
pub fn build_storage(config: &StorageConfig, backend: Option<Arc<dyn BlobStore>>) -> Arc<dyn LogStorage> {
    let inner: Arc<dyn LogStorage> = match backend {
        Some(backend) => Arc::new(SequencedLogStorage::new(Arc::new(PersistentLogStorage::new(backend)))),
        None => Arc::new(NullLogStorage),
    };
    Arc::new(LocalLogStorage::new(inner, config))
}
