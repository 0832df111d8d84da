use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use dashmap::DashMap;
use crate::core::error::{Error, Result};
use crate::core::types::LogId;
use crate::index::log_index::LogIndex;
use crate::log::chunk::LogChunk;
use crate::storage::LogStorage;

/// In-memory storage that counts calls, with optional latency and write failures
#[derive(Default)]
pub struct CountingLogStorage {
    indexes: DashMap<(LogId, u64), Arc<LogIndex>>,
    chunks: DashMap<(LogId, u64), Arc<LogChunk>>,
    index_reads: AtomicUsize,
    index_writes: AtomicUsize,
    chunk_reads: AtomicUsize,
    chunk_writes: AtomicUsize,
    delay_ms: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering
    pub fn with_delay(delay: Duration) -> Self {
        let storage = Self::default();
        storage.delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
        storage
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn index_reads(&self) -> usize {
        self.index_reads.load(Ordering::SeqCst)
    }

    pub fn index_writes(&self) -> usize {
        self.index_writes.load(Ordering::SeqCst)
    }

    pub fn chunk_reads(&self) -> usize {
        self.chunk_reads.load(Ordering::SeqCst)
    }

    pub fn chunk_writes(&self) -> usize {
        self.chunk_writes.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::backend("write rejected"));
        }
        Ok(())
    }
}

#[async_trait]
impl LogStorage for CountingLogStorage {
    async fn read_index(&self, log_id: LogId, length: u64) -> Result<Option<Arc<LogIndex>>> {
        self.index_reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.indexes.get(&(log_id, length)).map(|index| index.value().clone()))
    }

    async fn write_index(&self, log_id: LogId, length: u64, index: Arc<LogIndex>) -> Result<()> {
        self.index_writes.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_write()?;
        self.indexes.insert((log_id, length), index);
        Ok(())
    }

    async fn read_chunk(
        &self,
        log_id: LogId,
        offset: u64,
        _line_index: usize,
    ) -> Result<Option<Arc<LogChunk>>> {
        self.chunk_reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.chunks.get(&(log_id, offset)).map(|chunk| chunk.value().clone()))
    }

    async fn write_chunk(&self, log_id: LogId, offset: u64, chunk: Arc<LogChunk>) -> Result<()> {
        self.chunk_writes.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_write()?;
        self.chunks.insert((log_id, offset), chunk);
        Ok(())
    }
}
