use std::sync::Arc;
use async_trait::async_trait;
use bytes::BytesMut;
use tracing::{debug, instrument};
use crate::core::binary;
use crate::core::error::{Error, Result};
use crate::core::types::LogId;
use crate::index::log_index::LogIndex;
use crate::log::chunk::LogChunk;
use crate::storage::LogStorage;
use crate::storage::backend::BlobStore;

pub fn index_path(log_id: LogId, length: u64) -> String {
    format!("{}/index_{}", log_id, length)
}

pub fn chunk_path(log_id: LogId, offset: u64) -> String {
    format!("{}/offset_{}", log_id, offset)
}

/// Serializes items onto a path-addressed blob backend.
///
/// Stored bytes must decode exactly: leftover input after an item is corrupt.
pub struct PersistentLogStorage {
    backend: Arc<dyn BlobStore>,
}

impl PersistentLogStorage {
    pub fn new(backend: Arc<dyn BlobStore>) -> Self {
        PersistentLogStorage { backend }
    }
}

#[async_trait]
impl LogStorage for PersistentLogStorage {
    #[instrument(skip(self), fields(log_id = %log_id))]
    async fn read_index(&self, log_id: LogId, length: u64) -> Result<Option<Arc<LogIndex>>> {
        let Some(mut data) = self.backend.read(&index_path(log_id, length)).await? else {
            return Ok(None);
        };
        let size = data.len();
        let index = LogIndex::read(&mut data)?;
        binary::ensure_consumed(&data, "index")?;
        debug!(size, blocks = index.blocks().len(), "index loaded");
        Ok(Some(Arc::new(index)))
    }

    #[instrument(skip(self, index), fields(log_id = %log_id))]
    async fn write_index(&self, log_id: LogId, length: u64, index: Arc<LogIndex>) -> Result<()> {
        let size = index.serialized_size();
        let mut output = BytesMut::with_capacity(size);
        index.write(&mut output)?;
        if output.len() != size {
            return Err(Error::size_mismatch("index", size, output.len()));
        }
        self.backend.write(&index_path(log_id, length), output.freeze()).await
    }

    #[instrument(skip(self), fields(log_id = %log_id))]
    async fn read_chunk(
        &self,
        log_id: LogId,
        offset: u64,
        line_index: usize,
    ) -> Result<Option<Arc<LogChunk>>> {
        let Some(mut data) = self.backend.read(&chunk_path(log_id, offset)).await? else {
            return Ok(None);
        };
        let size = data.len();
        let chunk = LogChunk::read(&mut data, offset, line_index)?;
        binary::ensure_consumed(&data, "chunk")?;
        debug!(size, sub_chunks = chunk.sub_chunks().len(), "chunk loaded");
        Ok(Some(Arc::new(chunk)))
    }

    #[instrument(skip(self, chunk), fields(log_id = %log_id))]
    async fn write_chunk(&self, log_id: LogId, offset: u64, chunk: Arc<LogChunk>) -> Result<()> {
        let data = chunk.to_bytes()?;
        self.backend.write(&chunk_path(log_id, offset), data).await
    }
}
