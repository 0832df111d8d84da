use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use logvault::{
    build_storage, BlobStore, LogChunk, LogChunkBuilder, LogId, LogStorage, LogType, MemoryBlobStore, SearchQuery,
    Result, StorageConfig,
};

const TEXT: &[u8] = b"line one\nline two\nERROR: boom\n";

#[tokio::test]
async fn test_write_read_and_search_through_the_stack() {
    let backend = Arc::new(MemoryBlobStore::new());
    let config = StorageConfig::default();
    let storage = build_storage(&config, Some(backend.clone()));
    let log_id = LogId::new(0x5eed);

    let chunk = Arc::new(LogChunk::from_text(LogType::Text, 0, 0, TEXT));
    storage.write_chunk(log_id, 0, chunk).await.unwrap();
    assert_eq!(backend.write_count(), 1);

    // A second stack over the same backend has nothing cached
    let fresh = build_storage(&config, Some(backend.clone()));
    let loaded = fresh.read_chunk(log_id, 0, 0).await.unwrap().unwrap();
    assert_eq!(loaded.line_count(), 3);
    assert_eq!(&loaded.text().unwrap()[..], TEXT);

    let index = loaded.build_index().unwrap();
    let results = index.search(&SearchQuery::new("error").unwrap(), 0, 10).unwrap();
    assert_eq!(results.lines, vec![2]);
    assert!(!results.truncated);
}

#[tokio::test]
async fn test_index_written_once_is_served_from_cache() {
    let backend = Arc::new(MemoryBlobStore::new());
    let config = StorageConfig::default();
    let storage = build_storage(&config, Some(backend.clone()));
    let log_id = LogId::new(42);

    let mut builder = LogChunkBuilder::new(LogType::Text, 0, 0, 16);
    builder.append(b"Compiling core\nLinking app\nwarning: slow link\nBuild succeeded\n");
    let chunk = builder.build();
    let length = chunk.length() as u64;
    let index = Arc::new(chunk.build_index().unwrap());

    storage.write_index(log_id, length, index.clone()).await.unwrap();
    let cached = storage.read_index(log_id, length).await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&cached, &index));
    assert_eq!(backend.read_count(), 0);

    let fresh = build_storage(&config, Some(backend.clone()));
    let loaded = fresh.read_index(log_id, length).await.unwrap().unwrap();
    assert_eq!(*loaded, *index);
    let results = loaded.search(&SearchQuery::new("LINK").unwrap(), 0, 10).unwrap();
    assert_eq!(results.lines, vec![1, 2]);
}

#[tokio::test]
async fn test_missing_items_are_not_errors() {
    let backend = Arc::new(MemoryBlobStore::new());
    let storage = build_storage(&StorageConfig::default(), Some(backend.clone()));
    let log_id = LogId::new(1);

    assert!(storage.read_chunk(log_id, 4096, 100).await.unwrap().is_none());
    assert!(storage.read_index(log_id, 4096).await.unwrap().is_none());

    // The miss is remembered
    assert!(storage.read_chunk(log_id, 4096, 100).await.unwrap().is_none());
    assert_eq!(backend.read_count(), 2);
}

// Holds every read long enough for concurrent callers to pile up
struct SlowBlobStore {
    inner: MemoryBlobStore,
    delay: Duration,
}

#[async_trait]
impl BlobStore for SlowBlobStore {
    async fn read(&self, path: &str) -> Result<Option<Bytes>> {
        tokio::time::sleep(self.delay).await;
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        self.inner.write(path, data).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_readers_share_backend_reads() {
    let backend = Arc::new(SlowBlobStore { inner: MemoryBlobStore::new(), delay: Duration::from_millis(20) });
    let config = StorageConfig::default();
    let writer = build_storage(&config, Some(backend.clone()));
    let log_id = LogId::new(2);
    let chunk = Arc::new(LogChunk::from_text(LogType::Text, 0, 0, TEXT));
    writer.write_chunk(log_id, 0, chunk.clone()).await.unwrap();

    let reader = build_storage(&config, Some(backend.clone()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let reader = reader.clone();
        handles.push(tokio::spawn(async move { reader.read_chunk(log_id, 0, 0).await }));
    }
    for handle in handles {
        let loaded = handle.await.unwrap().unwrap().unwrap();
        assert!(loaded.text_matches(&chunk));
    }
    assert_eq!(backend.inner.read_count(), 1);
}
