pub mod core;
pub mod analysis;
pub mod compression;
pub mod index;
pub mod search;
pub mod log;
pub mod storage;

pub use crate::core::config::StorageConfig;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{LogId, LogType};
pub use crate::index::log_index::LogIndex;
pub use crate::log::chunk::{LogChunk, LogChunkBuilder};
pub use crate::log::subchunk::LogSubChunk;
pub use crate::search::query::SearchQuery;
pub use crate::search::results::{SearchResults, SearchStats};
pub use crate::storage::{build_storage, BlobStore, LogStorage, MemoryBlobStore};

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                             LOGVAULT STRUCT ARCHITECTURE                             │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── STORAGE LAYER ──────────────────────────────────┐
│                                                                                      │
│   caller                                                                             │
│     │                                                                                │
│     ▼                                                                                │
│  ┌──────────────────────────────┐   hits: LRU, sliding expiration                    │
│  │ struct LocalLogStorage       │   misses: fixed 30s, no capacity cost              │
│  │ • inner: Arc<dyn LogStorage> │   writes: cache, then await inner                  │
│  │ • state: Mutex<CacheState>   │                                                    │
│  └──────────────┬───────────────┘                                                    │
│                 ▼                                                                    │
│  ┌──────────────────────────────┐   one spawned task per key                         │
│  │ struct SequencedLogStorage   │   • index_reads  (LogId, length)                   │
│  │ • 4 × InFlightMap            │   • index_writes (LogId, length)                   │
│  │   DashMap<K, Shared<Task>>   │   • chunk_reads  (LogId, offset, line)             │
│  └──────────────┬───────────────┘   • chunk_writes (LogId, offset)                   │
│                 ▼                                                                    │
│  ┌──────────────────────────────┐   {logId}/index_{length}                           │
│  │ struct PersistentLogStorage  │   {logId}/offset_{offset}                          │
│  │ • backend: Arc<dyn BlobStore>│                                                    │
│  └──────────────────────────────┘   NullLogStorage stands in when there is no backend│
└──────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── LOG LAYER ────────────────────────────────────┐
│                                                                                      │
│  ┌────────────────────────┐      ┌─────────────────────────────────────────┐         │
│  │ struct LogChunk        │ 1..n │ struct LogSubChunk                      │         │
│  │ • offset: u64          │─────▶│ • log_type, offset, length              │         │
│  │ • line_index: usize    │      │ • line_index, line_count                │         │
│  │ • sub_chunks: Vec<>    │      │ • text: OnceLock<Arc<LogText>>          │         │
│  └────────────────────────┘      │ • compressed_text: OnceLock<Bytes>      │         │
│                                  │ • index: OnceLock<Arc<LogIndex>>        │         │
│  ┌────────────────────────┐      └─────────────────────────────────────────┘         │
│  │ struct LogChunkBuilder │      format v0 (no index) | v1 (inline trie) | v2        │
│  │ cuts on line bounds    │      always written as v2                                │
│  └────────────────────────┘                                                          │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── INDEX LAYER ───────────────────────────────────┐
│                                                                                      │
│  ┌────────────────────────────┐   ┌────────────────────────────┐                     │
│  │ struct LogIndex            │   │ struct IndexBlock          │                     │
│  │ • blocks: Vec<IndexBlock>  │──▶│ • line_index, line_count   │                     │
│  │ • trie: ReadOnlyTrie       │   │ • compressed_plain_text    │                     │
│  └────────────────────────────┘   └────────────────────────────┘                     │
│                                                                                      │
│  trie key (u64, big-endian in an fst::Set):                                          │
│  ┌───────────────────────────────────┬───────────────────────────────────┐           │
│  │ token: 4 folded bytes (63..32)    │ block ordinal (31..0)             │           │
│  └───────────────────────────────────┴───────────────────────────────────┘           │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── SEARCH LAYER ───────────────────────────────────┐
│                                                                                      │
│  SearchQuery ──▶ leading (any) ∩ following (all) patterns ──▶ candidate blocks       │
│                                                                          │           │
│  SearchResults { lines, stats, truncated } ◀── case-insensitive line scan ┘          │
└──────────────────────────────────────────────────────────────────────────────────────┘
*/
