use crate::engine::FlushOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Delivery counters shared between a handler and whoever monitors it.
///
/// Failed and partial flushes are counted separately from delivered
/// records so an outage never looks like success from the outside.
#[derive(Debug, Default)]
pub struct HandlerStats {
    /// Records handed to the handler.
    pub emitted: AtomicU64,
    /// Flush attempts on a non-empty buffer (or direct writes).
    pub flushes: AtomicU64,
    /// Records confirmed by the store.
    pub delivered: AtomicU64,
    /// Flushes that confirmed only a prefix of their batch.
    pub partial_flushes: AtomicU64,
    /// Flushes that confirmed nothing.
    pub failed_flushes: AtomicU64,
    /// Records given up on: failed direct writes, and events the layer
    /// could not enqueue because its channel was full.
    pub dropped: AtomicU64,
    /// Records left in the buffer after the latest flush. A gauge, not a
    /// running total.
    pub retained: AtomicU64,
}

/// Point-in-time copy of [`HandlerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub emitted: u64,
    pub flushes: u64,
    pub delivered: u64,
    pub partial_flushes: u64,
    pub failed_flushes: u64,
    pub dropped: u64,
    pub retained: u64,
}

impl HandlerStats {
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_retained(&self, count: usize) {
        self.retained.store(count as u64, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &FlushOutcome) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(outcome.confirmed() as u64, Ordering::Relaxed);
        match outcome {
            FlushOutcome::Delivered(_) => {}
            FlushOutcome::DeliveredPartial(..) => {
                self.partial_flushes.fetch_add(1, Ordering::Relaxed);
            }
            FlushOutcome::DeliveredNone(_) => {
                self.failed_flushes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            emitted: self.emitted.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            partial_flushes: self.partial_flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retained: self.retained.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[test]
    fn outcomes_are_counted_by_kind() {
        let stats = HandlerStats::default();
        stats.record_outcome(&FlushOutcome::Delivered(4));
        stats.record_outcome(&FlushOutcome::DeliveredPartial(2, TransportError::write("dup key")));
        stats.record_outcome(&FlushOutcome::DeliveredNone(TransportError::connect("refused")));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.flushes, 3);
        assert_eq!(snapshot.delivered, 6);
        assert_eq!(snapshot.partial_flushes, 1);
        assert_eq!(snapshot.failed_flushes, 1);
        assert_eq!(snapshot.retained, 0);
    }

    #[test]
    fn retained_tracks_the_latest_flush() {
        let stats = HandlerStats::default();
        stats.set_retained(5);
        stats.set_retained(2);
        assert_eq!(stats.snapshot().retained, 2);

        stats.set_retained(0);
        assert_eq!(stats.snapshot().retained, 0);
    }
}
