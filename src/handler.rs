use crate::engine::FlushOutcome;
use crate::record::LogRecord;
use crate::stats::HandlerStats;
use async_trait::async_trait;
use std::sync::Arc;

/// Destination for [`LogRecord`]s produced by the logging layer.
///
/// Implementations decide when records reach the document store: a
/// buffered handler batches them, a direct handler writes each one as it
/// arrives. Transport failures are absorbed by the handler and surface
/// only through the returned outcome, internal diagnostics and
/// [`HandlerStats`].
#[async_trait]
pub trait LogHandler: Send + Sync {
    /// Hand one record to the handler.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`] captured on the emitting
    ///   thread.
    ///
    /// **Returns**
    /// - `Some(outcome)` if the emission caused a write; the future only
    ///   resolves once that write finished.
    /// - `None` if the record was only buffered.
    async fn emit(&self, record: LogRecord) -> Option<FlushOutcome>;

    /// Write everything that is still buffered.
    ///
    /// **Returns**
    /// - `None` if there was nothing to write.
    ///
    /// Default implementation is a no-op for handlers without a buffer.
    async fn flush(&self) -> Option<FlushOutcome> {
        None
    }

    /// Release the handler's connection.
    ///
    /// This does not flush. Callers that need buffered records to be
    /// durable on shutdown call [`flush`](Self::flush) first.
    async fn close(&self);

    fn stats(&self) -> Arc<HandlerStats>;
}
