use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::LogId;
use crate::index::log_index::LogIndex;
use crate::log::chunk::LogChunk;
use crate::storage::LogStorage;

type SharedTask<T> = Shared<BoxFuture<'static, Result<T>>>;

struct InFlight<P, T> {
    id: u64,
    payload: P,
    task: SharedTask<T>,
}

/// Removes its in-flight entry when the task finishes, panics included
struct RemoveOnDrop<K: Eq + Hash, P, T> {
    entries: Arc<DashMap<K, InFlight<P, T>>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, P, T> Drop for RemoveOnDrop<K, P, T> {
    fn drop(&mut self) {
        self.entries.remove_if(&self.key, |_, in_flight| in_flight.id == self.id);
    }
}

/// Key to the one running task for that key
struct InFlightMap<K: Eq + Hash, P, T> {
    name: &'static str,
    entries: Arc<DashMap<K, InFlight<P, T>>>,
    next_id: AtomicU64,
}

impl<K, P, T> InFlightMap<K, P, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn new(name: &'static str) -> Self {
        InFlightMap {
            name,
            entries: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Join the task already running for `key`, or spawn `work` as that task.
    ///
    /// A caller may only join when `same_payload` accepts its payload; a
    /// different payload for a busy key is a conflict.
    async fn run<F>(&self, key: K, payload: P, same_payload: fn(&P, &P) -> bool, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let task = self.join_or_start(key, payload, same_payload, work)?;
        task.await
    }

    fn join_or_start<F>(&self, key: K, payload: P, same_payload: fn(&P, &P) -> bool, work: F) -> Result<SharedTask<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => {
                // Compare outside the shard lock; chunk comparison may deflate
                let (running, task) = (entry.get().payload.clone(), entry.get().task.clone());
                drop(entry);
                if !same_payload(&running, &payload) {
                    return Err(Error::new(
                        ErrorKind::Conflict,
                        format!("{} {:?} already in flight with different content", self.name, key),
                    ));
                }
                debug!(op = self.name, ?key, "joining in-flight request");
                Ok(task)
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let guard = RemoveOnDrop { entries: self.entries.clone(), key, id };
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    work.await
                });
                let name = self.name;
                let task = async move {
                    handle
                        .await
                        .map_err(|err| Error::new(ErrorKind::Internal, format!("{} task failed: {}", name, err)))?
                }
                .boxed()
                .shared();
                entry.insert(InFlight { id, payload, task: task.clone() });
                Ok(task)
            }
        }
    }
}

fn same_request(_: &(), _: &()) -> bool {
    true
}

fn same_index(a: &Arc<LogIndex>, b: &Arc<LogIndex>) -> bool {
    Arc::ptr_eq(a, b) || **a == **b
}

fn same_chunk(a: &Arc<LogChunk>, b: &Arc<LogChunk>) -> bool {
    Arc::ptr_eq(a, b) || a.text_matches(b)
}

/// Coalesces concurrent requests for the same key into one inner call.
///
/// Tasks run on the tokio pool and finish even if every caller goes away. The
/// map entry is dropped when the task ends, so the next request starts fresh.
/// Concurrent writes to one key are joined only when their content is equal.
pub struct SequencedLogStorage {
    inner: Arc<dyn LogStorage>,
    index_reads: InFlightMap<(LogId, u64), (), Option<Arc<LogIndex>>>,
    index_writes: InFlightMap<(LogId, u64), Arc<LogIndex>, ()>,
    chunk_reads: InFlightMap<(LogId, u64, usize), (), Option<Arc<LogChunk>>>,
    chunk_writes: InFlightMap<(LogId, u64), Arc<LogChunk>, ()>,
}

impl SequencedLogStorage {
    pub fn new(inner: Arc<dyn LogStorage>) -> Self {
        SequencedLogStorage {
            inner,
            index_reads: InFlightMap::new("index read"),
            index_writes: InFlightMap::new("index write"),
            chunk_reads: InFlightMap::new("chunk read"),
            chunk_writes: InFlightMap::new("chunk write"),
        }
    }

    /// Requests currently running against the inner layer
    pub fn in_flight(&self) -> usize {
        self.index_reads.len() + self.index_writes.len() + self.chunk_reads.len() + self.chunk_writes.len()
    }
}

#[async_trait]
impl LogStorage for SequencedLogStorage {
    async fn read_index(&self, log_id: LogId, length: u64) -> Result<Option<Arc<LogIndex>>> {
        let inner = self.inner.clone();
        self.index_reads
            .run((log_id, length), (), same_request, async move {
                inner.read_index(log_id, length).await
            })
            .await
    }

    async fn write_index(&self, log_id: LogId, length: u64, index: Arc<LogIndex>) -> Result<()> {
        let inner = self.inner.clone();
        let payload = index.clone();
        self.index_writes
            .run((log_id, length), payload, same_index, async move {
                inner.write_index(log_id, length, index).await
            })
            .await
    }

    async fn read_chunk(
        &self,
        log_id: LogId,
        offset: u64,
        line_index: usize,
    ) -> Result<Option<Arc<LogChunk>>> {
        let inner = self.inner.clone();
        self.chunk_reads
            .run((log_id, offset, line_index), (), same_request, async move {
                inner.read_chunk(log_id, offset, line_index).await
            })
            .await
    }

    async fn write_chunk(&self, log_id: LogId, offset: u64, chunk: Arc<LogChunk>) -> Result<()> {
        let inner = self.inner.clone();
        let payload = chunk.clone();
        self.chunk_writes
            .run((log_id, offset), payload, same_chunk, async move {
                inner.write_chunk(log_id, offset, chunk).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::core::types::LogType;
    use crate::storage::testing::CountingLogStorage;

    fn chunk(text: &'static [u8]) -> Arc<LogChunk> {
        Arc::new(LogChunk::from_text(LogType::Text, 0, 0, text))
    }

    fn sequenced(inner: &Arc<CountingLogStorage>) -> SequencedLogStorage {
        SequencedLogStorage::new(inner.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_inner_call() {
        let inner = Arc::new(CountingLogStorage::with_delay(Duration::from_millis(50)));
        let log_id = LogId::new(1);
        inner.write_chunk(log_id, 0, chunk(b"shared\n")).await.unwrap();
        let storage = sequenced(&inner);

        let (a, b) = tokio::join!(storage.read_chunk(log_id, 0, 0), storage.read_chunk(log_id, 0, 0));
        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(inner.chunk_reads(), 1);
        assert_eq!(storage.in_flight(), 0);

        storage.read_chunk(log_id, 0, 0).await.unwrap();
        assert_eq!(inner.chunk_reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_are_independent() {
        let inner = Arc::new(CountingLogStorage::with_delay(Duration::from_millis(50)));
        let storage = sequenced(&inner);
        let log_id = LogId::new(2);

        let (a, b) = tokio::join!(storage.read_index(log_id, 10), storage.read_index(log_id, 20));
        assert!(a.unwrap().is_none() && b.unwrap().is_none());
        assert_eq!(inner.index_reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_writes_coalesce() {
        let inner = Arc::new(CountingLogStorage::with_delay(Duration::from_millis(50)));
        let storage = sequenced(&inner);
        let log_id = LogId::new(3);

        let (a, b) = tokio::join!(
            storage.write_chunk(log_id, 0, chunk(b"same\n")),
            storage.write_chunk(log_id, 0, chunk(b"same\n")),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(inner.chunk_writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_differing_concurrent_write_is_a_conflict() {
        let inner = Arc::new(CountingLogStorage::with_delay(Duration::from_millis(50)));
        let storage = sequenced(&inner);
        let log_id = LogId::new(4);

        let (a, b) = tokio::join!(
            storage.write_chunk(log_id, 0, chunk(b"first\n")),
            storage.write_chunk(log_id, 0, chunk(b"second\n")),
        );
        a.unwrap();
        assert_eq!(b.unwrap_err().kind, ErrorKind::Conflict);
        assert_eq!(inner.chunk_writes(), 1);

        // Once the first write is done the key is free again
        storage.write_chunk(log_id, 0, chunk(b"second\n")).await.unwrap();
        assert_eq!(inner.chunk_writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_then_forgotten() {
        let inner = Arc::new(CountingLogStorage::with_delay(Duration::from_millis(50)));
        inner.fail_writes(true);
        let storage = sequenced(&inner);
        let log_id = LogId::new(5);
        let index = Arc::new(LogIndex::empty());

        let (a, b) = tokio::join!(
            storage.write_index(log_id, 1, index.clone()),
            storage.write_index(log_id, 1, index.clone()),
        );
        assert_eq!(a.unwrap_err().kind, ErrorKind::Backend);
        assert_eq!(b.unwrap_err().kind, ErrorKind::Backend);
        assert_eq!(inner.index_writes(), 1);

        inner.fail_writes(false);
        storage.write_index(log_id, 1, index).await.unwrap();
        assert_eq!(inner.index_writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_outlives_abandoned_caller() {
        let inner = Arc::new(CountingLogStorage::with_delay(Duration::from_millis(50)));
        let storage = sequenced(&inner);
        let log_id = LogId::new(6);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(1),
            storage.write_chunk(log_id, 0, chunk(b"kept\n")),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(inner.read_chunk(log_id, 0, 0).await.unwrap().is_some());
        assert_eq!(storage.in_flight(), 0);
    }

    thread_local! {
        static WATCHED: std::cell::RefCell<Option<Arc<DashMap<u32, InFlight<u32, ()>>>>> =
            std::cell::RefCell::new(None);
    }

    // Equal only if the in-flight entry can be read while comparing
    fn same_while_unlocked(a: &u32, b: &u32) -> bool {
        let readable = WATCHED.with(|watched| {
            watched
                .borrow()
                .as_ref()
                .is_some_and(|entries| entries.try_get(&7).is_present())
        });
        readable && a == b
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_comparison_does_not_hold_the_map() {
        let map: InFlightMap<u32, u32, ()> = InFlightMap::new("test");
        WATCHED.with(|watched| *watched.borrow_mut() = Some(map.entries.clone()));

        let first = map
            .join_or_start(7, 1, same_while_unlocked, async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
            .unwrap();
        let second = map.join_or_start(7, 1, same_while_unlocked, async { Ok(()) }).unwrap();
        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(map.len(), 0);
    }
}
