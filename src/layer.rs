use crate::handler::LogHandler;
use crate::record::{LogRecord, Severity};
use crate::stats::HandlerStats;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target prefix of this crate's own diagnostics. Events under it are never
/// captured, otherwise a failing flush would log into the handler that is
/// failing.
const INTERNAL_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that snapshots events into [`LogRecord`]s
/// and hands them to a [`LogHandler`].
///
/// Records are captured on the emitting thread (so process, thread and
/// source identity are the caller's) and passed over a bounded channel to a
/// background task that drives the handler. The application thread never
/// waits on store I/O.
///
/// This is the one place a record can be lost before reaching a handler:
/// when the channel is full the event is dropped rather than blocking the
/// caller. Such drops count in [`dropped_events`](Self::dropped_events) and
/// in the handler's [`HandlerStats::dropped`], but never in its `emitted`.
pub struct MongoLogLayer {
    sender: mpsc::Sender<LogRecord>,
    handler_stats: Arc<HandlerStats>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full or closed.
    pub dropped_events: Arc<AtomicU64>,
}

impl MongoLogLayer {
    /// Create a new layer and spawn the task that feeds the handler.
    ///
    /// Events more verbose than `min_level` are ignored. The channel holds
    /// at least 16 records.
    ///
    /// When every sender is gone (the subscriber was dropped) the task
    /// flushes the handler once and closes it, then exits.
    pub fn new(handler: Arc<dyn LogHandler>, buffer: usize, min_level: Level) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer);
        let handler_stats = handler.stats();

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                handler.emit(record).await;
            }
            handler.flush().await;
            handler.close().await;
        });

        (Self {
            sender: tx,
            handler_stats,
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
        }, handle)
    }
}

impl<S> Layer<S> for MongoLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if *meta.level() > self.min_level || meta.target().starts_with(INTERNAL_TARGET) {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let mut record = LogRecord::capture(Severity::from(meta.level()), message)
            .with_location(meta.file(), meta.module_path(), meta.line());
        record.fields = fields;
        if let Some(span) = ctx.event_span(event) {
            record = record.with_function(span.name());
        }

        match self.sender.try_send(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                self.handler_stats.record_dropped(1);
            }
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    // `info!("text")` delivers its message through here, not `record_str`.
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
