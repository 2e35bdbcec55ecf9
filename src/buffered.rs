use crate::buffer::RecordBuffer;
use crate::config::HandlerConfig;
use crate::connection;
use crate::dispatch::DispatchPolicy;
use crate::engine::{FlushEngine, FlushOutcome};
use crate::error::HandlerError;
use crate::handler::LogHandler;
use crate::record::LogRecord;
use crate::stats::HandlerStats;
use crate::transport::{Namespace, SinkTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Handler that buffers records and writes them in ordered batches.
///
/// The buffer is flushed when it reaches `capacity` or when a record at or
/// above `flush_threshold` is emitted. With
/// [`ConnectionMode::PerFlush`](crate::connection::ConnectionMode::PerFlush)
/// every flush opens and closes its own connection, which suits low to
/// medium log volume; `Persistent` keeps one connection for the handler's
/// lifetime.
///
/// Records a flush could not deliver stay buffered, in order, and are
/// retried by the next flush. Delivery is at-least-once: a record may be
/// written twice if an acknowledgment is lost.
pub struct BufferedHandler<T: SinkTransport> {
    engine: FlushEngine<T>,
    policy: DispatchPolicy,
}

impl<T: SinkTransport> BufferedHandler<T> {
    /// Construct a handler over `transport`.
    ///
    /// **Returns**
    /// - `Err(HandlerError)` if the config is invalid, or if
    ///   `auto_create_collection` is set and the collection could not be
    ///   prepared.
    pub async fn new(transport: T, config: HandlerConfig) -> Result<Self, HandlerError> {
        config.validate()?;
        let namespace = config.namespace();
        let slot = connection::prepare(&transport, &namespace, &config).await?;

        let engine = FlushEngine::new(
            transport,
            namespace,
            RecordBuffer::new(config.capacity),
            slot,
            Arc::new(HandlerStats::default()),
        );

        Ok(BufferedHandler {
            engine,
            policy: DispatchPolicy::new(config.flush_threshold, config.capacity),
        })
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn namespace(&self) -> &Namespace {
        self.engine.namespace()
    }

    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    pub async fn pending(&self) -> usize {
        self.engine.pending().await
    }

    pub async fn pending_records(&self) -> Vec<LogRecord> {
        self.engine.pending_records().await
    }

    pub async fn is_connected(&self) -> bool {
        self.engine.is_connected().await
    }
}

#[async_trait]
impl<T: SinkTransport> LogHandler for BufferedHandler<T> {
    async fn emit(&self, record: LogRecord) -> Option<FlushOutcome> {
        self.engine.stats().record_emitted();
        let severity = record.severity;

        // Append and the trigger check share one critical section with the
        // flush they may start.
        let mut state = self.engine.lock().await;
        state.buffer.append(record);

        let trigger = self.policy.evaluate(severity, state.buffer.len())?;
        debug!(
            namespace = %self.engine.namespace(),
            trigger = trigger.as_str(),
            buffered = state.buffer.len(),
            "flush triggered"
        );
        self.engine.flush_locked(&mut state).await
    }

    async fn flush(&self) -> Option<FlushOutcome> {
        self.engine.flush().await
    }

    async fn close(&self) {
        self.engine.close().await;
    }

    fn stats(&self) -> Arc<HandlerStats> {
        Arc::clone(self.engine.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionMode;
    use crate::memory::MemoryTransport;
    use crate::record::Severity;

    fn info(message: &str) -> LogRecord {
        LogRecord::capture(Severity::Info, Some(message.to_string()))
    }

    #[tokio::test]
    async fn rejects_zero_capacity() {
        let config = HandlerConfig {
            capacity: 0,
            ..HandlerConfig::default()
        };
        let result = BufferedHandler::new(MemoryTransport::new(), config).await;
        assert!(matches!(result, Err(HandlerError::ZeroCapacity)));
    }

    #[tokio::test]
    async fn below_triggers_only_buffers() {
        let transport = MemoryTransport::new();
        let handler = BufferedHandler::new(transport.clone(), HandlerConfig::default())
            .await
            .unwrap();

        assert!(handler.emit(info("a")).await.is_none());
        assert!(handler.emit(info("b")).await.is_none());
        assert_eq!(handler.pending().await, 2);
        assert_eq!(transport.writes(), 0);
        assert_eq!(handler.stats().snapshot().emitted, 2);
    }

    #[tokio::test]
    async fn persistent_mode_reuses_one_connection() {
        let transport = MemoryTransport::new();
        let config = HandlerConfig {
            capacity: 2,
            connection_mode: ConnectionMode::Persistent,
            ..HandlerConfig::default()
        };
        let handler = BufferedHandler::new(transport.clone(), config).await.unwrap();
        assert!(handler.is_connected().await);

        for i in 0..6 {
            handler.emit(info(&format!("r{}", i))).await;
        }
        assert_eq!(transport.writes(), 3);
        assert_eq!(transport.connects(), 1);
        assert_eq!(transport.disconnects(), 0);

        handler.close().await;
        assert_eq!(transport.disconnects(), 1);
        assert!(!handler.is_connected().await);
    }

    #[tokio::test]
    async fn close_does_not_flush() {
        let transport = MemoryTransport::new();
        let handler = BufferedHandler::new(transport.clone(), HandlerConfig::default())
            .await
            .unwrap();

        handler.emit(info("pending")).await;
        handler.close().await;

        assert_eq!(handler.pending().await, 1);
        assert!(transport.written().is_empty());
    }
}
