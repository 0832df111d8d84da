use std::sync::Arc;
use async_trait::async_trait;
use crate::core::error::Result;
use crate::core::types::LogId;
use crate::index::log_index::LogIndex;
use crate::log::chunk::LogChunk;
use crate::storage::LogStorage;

/// Storage that holds nothing: reads miss, writes succeed
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogStorage;

#[async_trait]
impl LogStorage for NullLogStorage {
    async fn read_index(&self, _log_id: LogId, _length: u64) -> Result<Option<Arc<LogIndex>>> {
        Ok(None)
    }

    async fn write_index(&self, _log_id: LogId, _length: u64, _index: Arc<LogIndex>) -> Result<()> {
        Ok(())
    }

    async fn read_chunk(
        &self,
        _log_id: LogId,
        _offset: u64,
        _line_index: usize,
    ) -> Result<Option<Arc<LogChunk>>> {
        Ok(None)
    }

    async fn write_chunk(&self, _log_id: LogId, _offset: u64, _chunk: Arc<LogChunk>) -> Result<()> {
        Ok(())
    }
}
