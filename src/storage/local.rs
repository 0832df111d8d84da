use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;
use crate::core::config::StorageConfig;
use crate::core::error::Result;
use crate::core::types::LogId;
use crate::index::log_index::LogIndex;
use crate::log::chunk::LogChunk;
use crate::storage::LogStorage;

#[derive(Debug, Clone)]
enum CachedItem {
    Index(Arc<LogIndex>),
    Chunk(Arc<LogChunk>),
}

struct PositiveEntry {
    item: CachedItem,
    expires_at: Instant,
}

struct CacheState {
    positive: LruCache<String, PositiveEntry>,  // Sliding expiration, one unit each
    negative: HashMap<String, Instant>,         // Fixed expiration, no capacity cost
}

/// In-process cache in front of another storage layer.
///
/// Hits are kept with a sliding expiration and count against the capacity.
/// Misses are remembered for a short fixed time outside the capacity so they
/// never evict real data. Writes go to the cache and then through to the inner
/// layer before completing.
pub struct LocalLogStorage {
    inner: Arc<dyn LogStorage>,
    state: Mutex<CacheState>,
    positive_expiration: Duration,
    negative_expiration: Duration,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub positive_entries: usize,
    pub negative_entries: usize,
    pub capacity: usize,
}

fn index_key(log_id: LogId, length: u64) -> String {
    format!("{}/index-{}", log_id, length)
}

fn chunk_key(log_id: LogId, offset: u64) -> String {
    format!("{}/chunk-{}", log_id, offset)
}

impl LocalLogStorage {
    pub fn new(inner: Arc<dyn LogStorage>, config: &StorageConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        LocalLogStorage {
            inner,
            state: Mutex::new(CacheState {
                positive: LruCache::new(capacity),
                negative: HashMap::new(),
            }),
            positive_expiration: config.positive_expiration(),
            negative_expiration: config.negative_expiration(),
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    /// `Some(None)` is a remembered miss
    fn lookup(&self, key: &str) -> Option<Option<CachedItem>> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let live = match state.positive.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.positive_expiration;
                Some(entry.item.clone())
            }
            Some(_) => None,
            None => None,
        };
        if let Some(item) = live {
            return Some(Some(item));
        }
        state.positive.pop(key);

        match state.negative.get(key) {
            Some(&expires_at) if expires_at > now => Some(None),
            Some(_) => {
                state.negative.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, item: Option<CachedItem>) {
        let now = Instant::now();
        let mut state = self.state.lock();
        match item {
            Some(item) => {
                state.negative.remove(&key);
                state.positive.put(key, PositiveEntry { item, expires_at: now + self.positive_expiration });
            }
            None => {
                if state.negative.len() >= state.positive.cap().get() {
                    state.negative.retain(|_, expires_at| *expires_at > now);
                }
                state.negative.insert(key, now + self.negative_expiration);
            }
        }
    }

    fn evict(&self, key: &str) {
        let mut state = self.state.lock();
        state.positive.pop(key);
        state.negative.remove(key);
    }

    fn record(&self, key: &str, hit: bool) {
        if hit {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            debug!(key, "local cache hit");
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            debug!(key, "local cache miss");
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            positive_entries: state.positive.len(),
            negative_entries: state.negative.len(),
            capacity: state.positive.cap().get(),
        }
    }
}

#[async_trait]
impl LogStorage for LocalLogStorage {
    async fn read_index(&self, log_id: LogId, length: u64) -> Result<Option<Arc<LogIndex>>> {
        let key = index_key(log_id, length);
        match self.lookup(&key) {
            Some(Some(CachedItem::Index(index))) => {
                self.record(&key, true);
                return Ok(Some(index));
            }
            Some(None) => {
                self.record(&key, true);
                return Ok(None);
            }
            _ => self.record(&key, false),
        }

        let index = self.inner.read_index(log_id, length).await?;
        self.store(key, index.clone().map(CachedItem::Index));
        Ok(index)
    }

    async fn write_index(&self, log_id: LogId, length: u64, index: Arc<LogIndex>) -> Result<()> {
        let key = index_key(log_id, length);
        self.store(key.clone(), Some(CachedItem::Index(index.clone())));
        if let Err(err) = self.inner.write_index(log_id, length, index).await {
            self.evict(&key);
            return Err(err);
        }
        Ok(())
    }

    async fn read_chunk(
        &self,
        log_id: LogId,
        offset: u64,
        line_index: usize,
    ) -> Result<Option<Arc<LogChunk>>> {
        let key = chunk_key(log_id, offset);
        match self.lookup(&key) {
            Some(Some(CachedItem::Chunk(chunk))) => {
                self.record(&key, true);
                return Ok(Some(chunk));
            }
            Some(None) => {
                self.record(&key, true);
                return Ok(None);
            }
            _ => self.record(&key, false),
        }

        let chunk = self.inner.read_chunk(log_id, offset, line_index).await?;
        self.store(key, chunk.clone().map(CachedItem::Chunk));
        Ok(chunk)
    }

    async fn write_chunk(&self, log_id: LogId, offset: u64, chunk: Arc<LogChunk>) -> Result<()> {
        let key = chunk_key(log_id, offset);
        self.store(key.clone(), Some(CachedItem::Chunk(chunk.clone())));
        if let Err(err) = self.inner.write_chunk(log_id, offset, chunk).await {
            self.evict(&key);
            return Err(err);
        }
        Ok(())
    }
}
