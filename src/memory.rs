use crate::record::LogRecord;
use crate::transport::{CollectionOptions, Namespace, SinkTransport, TransportError, WriteResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Failure injected into a [`MemoryTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Failure {
    #[default]
    None,
    /// `connect` fails.
    Connect,
    /// Every write is rejected before any record is stored.
    Reject,
    /// Each write stores at most this many records, then fails.
    AfterRecords(usize),
}

/// In-process transport that keeps written records in memory.
///
/// Useful for measuring the overhead of the handlers without any external
/// I/O, and for tests that need to script connection or write failures.
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: Mutex<HashMap<Namespace, Vec<LogRecord>>>,
    collections: Mutex<HashSet<Namespace>>,
    failure: Mutex<Failure>,
    write_delay: Mutex<Option<Duration>>,
    next_connection: AtomicU64,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    writes: AtomicUsize,
    created: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Connection handed out by [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryConnection {
    pub id: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_delay(self, delay: Duration) -> Self {
        *lock(&self.inner.write_delay) = Some(delay);
        self
    }

    pub fn set_failure(&self, failure: Failure) {
        *lock(&self.inner.failure) = failure;
    }

    /// Every record written so far, across namespaces, in write order per
    /// namespace.
    pub fn written(&self) -> Vec<LogRecord> {
        lock(&self.inner.documents).values().flatten().cloned().collect()
    }

    pub fn written_to(&self, namespace: &Namespace) -> Vec<LogRecord> {
        lock(&self.inner.documents)
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_collection(&self, namespace: &Namespace) -> bool {
        lock(&self.inner.collections).contains(namespace)
    }

    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn collections_created(&self) -> usize {
        self.inner.created.load(Ordering::SeqCst)
    }

    /// Highest number of writes observed running at the same time.
    pub fn max_concurrent_writes(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Failure {
        *lock(&self.inner.failure)
    }
}

#[async_trait]
impl SinkTransport for MemoryTransport {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, TransportError> {
        if self.failure() == Failure::Connect {
            return Err(TransportError::connect("connection refused"));
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        let id = self.inner.next_connection.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection { id })
    }

    async fn write_ordered(
        &self,
        _connection: &mut MemoryConnection,
        namespace: &Namespace,
        records: &[LogRecord],
    ) -> WriteResult {
        let running = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.inner.write_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.failure() {
            Failure::Reject => WriteResult::Rejected(TransportError::write("write rejected")),
            Failure::AfterRecords(n) if n < records.len() => {
                self.store(namespace, &records[..n]);
                WriteResult::Partial {
                    written: n,
                    cause: TransportError::write(format!("write failed at index {}", n)),
                }
            }
            _ => {
                self.store(namespace, records);
                WriteResult::Complete
            }
        };

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn disconnect(&self, _connection: MemoryConnection) {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn ensure_collection_exists(
        &self,
        _connection: &mut MemoryConnection,
        namespace: &Namespace,
        _options: &CollectionOptions,
    ) -> Result<(), TransportError> {
        if lock(&self.inner.collections).insert(namespace.clone()) {
            self.inner.created.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl MemoryTransport {
    fn store(&self, namespace: &Namespace, records: &[LogRecord]) {
        lock(&self.inner.documents)
            .entry(namespace.clone())
            .or_default()
            .extend_from_slice(records);
    }
}
