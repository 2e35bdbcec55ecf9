use crate::buffer::RecordBuffer;
use crate::connection::ConnectionSlot;
use crate::record::LogRecord;
use crate::stats::HandlerStats;
use crate::transport::{Namespace, SinkTransport, TransportError, WriteResult};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Result of one flush attempt.
///
/// The count is always a prefix length of the batch that was submitted:
/// those records are durably written and get removed from the buffer.
#[derive(Debug)]
pub enum FlushOutcome {
    /// The whole batch was written.
    Delivered(usize),
    /// The first `n` records were written, then the write failed.
    DeliveredPartial(usize, TransportError),
    /// Nothing was confirmed; the batch stays buffered.
    DeliveredNone(TransportError),
}

impl FlushOutcome {
    pub fn from_write(result: WriteResult, batch_len: usize) -> Self {
        match result {
            WriteResult::Complete => FlushOutcome::Delivered(batch_len),
            WriteResult::Partial { written, cause } => FlushOutcome::DeliveredPartial(written, cause),
            WriteResult::Rejected(cause) => FlushOutcome::DeliveredNone(cause),
        }
    }

    /// Number of records confirmed written.
    pub fn confirmed(&self) -> usize {
        match self {
            FlushOutcome::Delivered(n) | FlushOutcome::DeliveredPartial(n, _) => *n,
            FlushOutcome::DeliveredNone(_) => 0,
        }
    }

    pub fn cause(&self) -> Option<&TransportError> {
        match self {
            FlushOutcome::Delivered(_) => None,
            FlushOutcome::DeliveredPartial(_, cause) | FlushOutcome::DeliveredNone(cause) => Some(cause),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, FlushOutcome::Delivered(_))
    }
}

/// State guarded by the engine lock: the pending records and the
/// connection they are written through.
pub(crate) struct EngineState<C> {
    pub(crate) buffer: RecordBuffer,
    pub(crate) connection: ConnectionSlot<C>,
}

/// Moves buffered records to a [`SinkTransport`].
///
/// A single async mutex covers the buffer and the connection slot. It is
/// held for the whole flush, transport I/O included, so appends and
/// flushes never interleave and at most one flush runs at a time.
pub struct FlushEngine<T: SinkTransport> {
    transport: T,
    namespace: Namespace,
    state: Mutex<EngineState<T::Connection>>,
    stats: Arc<HandlerStats>,
}

impl<T: SinkTransport> FlushEngine<T> {
    pub(crate) fn new(
        transport: T,
        namespace: Namespace,
        buffer: RecordBuffer,
        connection: ConnectionSlot<T::Connection>,
        stats: Arc<HandlerStats>,
    ) -> Self {
        FlushEngine {
            transport,
            namespace,
            state: Mutex::new(EngineState { buffer, connection }),
            stats,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> &Arc<HandlerStats> {
        &self.stats
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, EngineState<T::Connection>> {
        self.state.lock().await
    }

    /// Flush the whole buffer. Returns `None` if there was nothing to do.
    pub async fn flush(&self) -> Option<FlushOutcome> {
        let mut state = self.lock().await;
        self.flush_locked(&mut state).await
    }

    /// Flush with the lock already held by the caller.
    pub(crate) async fn flush_locked(&self, state: &mut EngineState<T::Connection>) -> Option<FlushOutcome> {
        if state.buffer.is_empty() {
            return None;
        }

        let batch_len = state.buffer.len();
        let outcome = match state.connection.acquire(&self.transport).await {
            Ok(mut connection) => {
                let result = self
                    .transport
                    .write_ordered(&mut connection, &self.namespace, state.buffer.snapshot())
                    .await;
                state.connection.release(&self.transport, connection).await;
                FlushOutcome::from_write(result, batch_len)
            }
            Err(cause) => FlushOutcome::DeliveredNone(cause),
        };

        state.buffer.drain_prefix(outcome.confirmed());
        self.stats.record_outcome(&outcome);
        self.stats.set_retained(state.buffer.len());
        report(&self.namespace, batch_len, state.buffer.len(), &outcome);

        Some(outcome)
    }

    /// Number of records waiting for delivery.
    pub async fn pending(&self) -> usize {
        self.lock().await.buffer.len()
    }

    /// Copy of the records waiting for delivery, oldest first.
    pub async fn pending_records(&self) -> Vec<LogRecord> {
        self.lock().await.buffer.snapshot().to_vec()
    }

    pub async fn is_connected(&self) -> bool {
        self.lock().await.connection.is_open()
    }

    /// Release a persistent connection. Buffered records are left as is.
    pub async fn close(&self) {
        let mut state = self.lock().await;
        state.connection.close(&self.transport).await;
    }
}

pub(crate) fn report(namespace: &Namespace, batch_len: usize, retained: usize, outcome: &FlushOutcome) {
    match outcome {
        FlushOutcome::Delivered(n) => {
            debug!(namespace = %namespace, delivered = n, "flushed log records");
        }
        FlushOutcome::DeliveredPartial(n, cause) => {
            warn!(
                namespace = %namespace,
                batch = batch_len,
                delivered = n,
                retained,
                error = %cause,
                "partial flush, retaining undelivered records"
            );
        }
        FlushOutcome::DeliveredNone(cause) => {
            warn!(
                namespace = %namespace,
                batch = batch_len,
                retained,
                error = %cause,
                "flush failed, retaining records"
            );
        }
    }
}
