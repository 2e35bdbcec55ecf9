use crate::config::HandlerConfig;
use crate::connection::{self, ConnectionSlot};
use crate::engine::{report, FlushOutcome};
use crate::error::HandlerError;
use crate::handler::LogHandler;
use crate::record::LogRecord;
use crate::stats::HandlerStats;
use crate::transport::{Namespace, SinkTransport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

struct DirectState<C> {
    connection: ConnectionSlot<C>,
    next_sequence: u64,
}

/// Handler that writes every record as soon as it is emitted.
///
/// In [`ConnectionMode::PerFlush`](crate::connection::ConnectionMode::PerFlush)
/// each record pays for a full connect/insert/disconnect round trip, which
/// is only acceptable for low log volume but keeps no idle connection.
/// `Persistent` mode keeps one connection open until [`LogHandler::close`].
///
/// There is no retry buffer: a record whose write fails is dropped and
/// counted in [`HandlerStats::dropped`].
pub struct DirectHandler<T: SinkTransport> {
    transport: T,
    namespace: Namespace,
    state: Mutex<DirectState<T::Connection>>,
    stats: Arc<HandlerStats>,
}

impl<T: SinkTransport> DirectHandler<T> {
    /// Construct a handler over `transport`. `capacity` and
    /// `flush_threshold` from the config are not used.
    pub async fn new(transport: T, config: HandlerConfig) -> Result<Self, HandlerError> {
        config.validate()?;
        let namespace = config.namespace();
        let connection = connection::prepare(&transport, &namespace, &config).await?;

        Ok(DirectHandler {
            transport,
            namespace,
            state: Mutex::new(DirectState {
                connection,
                next_sequence: 1,
            }),
            stats: Arc::new(HandlerStats::default()),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connection.is_open()
    }
}

#[async_trait]
impl<T: SinkTransport> LogHandler for DirectHandler<T> {
    async fn emit(&self, mut record: LogRecord) -> Option<FlushOutcome> {
        self.stats.record_emitted();

        let mut state = self.state.lock().await;
        record.sequence = state.next_sequence;
        state.next_sequence += 1;

        let outcome = match state.connection.acquire(&self.transport).await {
            Ok(mut connection) => {
                let result = self
                    .transport
                    .write_ordered(&mut connection, &self.namespace, std::slice::from_ref(&record))
                    .await;
                state.connection.release(&self.transport, connection).await;
                FlushOutcome::from_write(result, 1)
            }
            Err(cause) => FlushOutcome::DeliveredNone(cause),
        };
        drop(state);

        self.stats.record_outcome(&outcome);
        match outcome.cause() {
            // No retry buffer: the record is gone.
            Some(cause) if outcome.confirmed() == 0 => {
                self.stats.record_dropped(1);
                warn!(
                    namespace = %self.namespace,
                    sequence = record.sequence,
                    level = record.severity.as_str(),
                    error = %cause,
                    "log record dropped"
                );
            }
            _ => report(&self.namespace, 1, 0, &outcome),
        }

        Some(outcome)
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        state.connection.close(&self.transport).await;
    }

    fn stats(&self) -> Arc<HandlerStats> {
        Arc::clone(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionMode;
    use crate::memory::{Failure, MemoryTransport};
    use crate::record::Severity;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn record(message: &str) -> LogRecord {
        LogRecord::capture(Severity::Debug, Some(message.to_string()))
    }

    /// Collects the message of every event this crate logs.
    #[derive(Clone, Default)]
    struct Messages(Arc<std::sync::Mutex<Vec<String>>>);

    struct MessageVisitor<'a>(&'a mut Vec<String>);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0.push(format!("{:?}", value));
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for Messages {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut messages = self.0.lock().unwrap();
            event.record(&mut MessageVisitor(&mut messages));
        }
    }

    #[tokio::test]
    async fn per_flush_mode_connects_for_every_record() {
        let transport = MemoryTransport::new();
        let handler = DirectHandler::new(transport.clone(), HandlerConfig::default())
            .await
            .unwrap();

        for m in ["a", "b", "c"] {
            let outcome = handler.emit(record(m)).await.unwrap();
            assert!(outcome.is_complete());
        }

        assert_eq!(transport.connects(), 3);
        assert_eq!(transport.disconnects(), 3);
        assert!(!handler.is_connected().await);

        let sequences: Vec<u64> = transport.written().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn persistent_mode_keeps_connection_until_close() {
        let transport = MemoryTransport::new();
        let config = HandlerConfig {
            connection_mode: ConnectionMode::Persistent,
            ..HandlerConfig::default()
        };
        let handler = DirectHandler::new(transport.clone(), config).await.unwrap();

        handler.emit(record("a")).await;
        handler.emit(record("b")).await;
        assert_eq!(transport.connects(), 1);
        assert!(handler.is_connected().await);

        handler.close().await;
        assert_eq!(transport.disconnects(), 1);
    }

    #[tokio::test]
    async fn failed_write_drops_record() {
        let transport = MemoryTransport::new();
        let handler = DirectHandler::new(transport.clone(), HandlerConfig::default())
            .await
            .unwrap();

        transport.set_failure(Failure::Connect);
        let outcome = handler.emit(record("lost")).await.unwrap();
        assert_eq!(outcome.confirmed(), 0);

        transport.set_failure(Failure::None);
        handler.emit(record("kept")).await;

        let written = transport.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].message.as_deref(), Some("kept"));

        let stats = handler.stats().snapshot();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.failed_flushes, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn dropped_record_is_not_reported_as_retained() {
        let messages = Messages::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(messages.clone()));

        let transport = MemoryTransport::new();
        let handler = DirectHandler::new(transport.clone(), HandlerConfig::default())
            .await
            .unwrap();
        transport.set_failure(Failure::Reject);
        handler.emit(record("lost")).await;

        let seen = messages.0.lock().unwrap().clone();
        assert_eq!(seen.iter().filter(|m| *m == "log record dropped").count(), 1);
        assert!(!seen.iter().any(|m| m.contains("retaining")));
        assert_eq!(handler.stats().snapshot().retained, 0);
    }
}
