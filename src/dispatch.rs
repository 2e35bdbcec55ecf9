use crate::record::Severity;

/// Reason a flush was started by the dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The record was at or above the flush threshold.
    Severity,
    /// The buffer reached its capacity.
    Capacity,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Severity => "severity",
            FlushTrigger::Capacity => "capacity",
        }
    }
}

/// Per-emission decision between append-only and append-and-flush.
///
/// Both triggers are evaluated on every emission after the record has been
/// appended; there is no timer. A fired trigger flushes the whole buffer.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    flush_threshold: Severity,
    capacity: usize,
}

impl DispatchPolicy {
    pub fn new(flush_threshold: Severity, capacity: usize) -> Self {
        DispatchPolicy {
            flush_threshold,
            capacity: capacity.max(1),
        }
    }

    pub fn flush_threshold(&self) -> Severity {
        self.flush_threshold
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Decide whether the record just appended must be flushed now.
    ///
    /// `buffered` is the buffer length including that record.
    pub fn evaluate(&self, severity: Severity, buffered: usize) -> Option<FlushTrigger> {
        if severity >= self.flush_threshold {
            Some(FlushTrigger::Severity)
        } else if buffered >= self.capacity {
            Some(FlushTrigger::Capacity)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_and_capacity_appends_only() {
        let policy = DispatchPolicy::new(Severity::Error, 3);
        assert_eq!(policy.evaluate(Severity::Info, 1), None);
        assert_eq!(policy.evaluate(Severity::Warn, 2), None);
    }

    #[test]
    fn capacity_reached_triggers_flush() {
        let policy = DispatchPolicy::new(Severity::Error, 3);
        assert_eq!(policy.evaluate(Severity::Info, 3), Some(FlushTrigger::Capacity));
        assert_eq!(policy.evaluate(Severity::Info, 4), Some(FlushTrigger::Capacity));
    }

    #[test]
    fn severity_at_threshold_triggers_flush() {
        let policy = DispatchPolicy::new(Severity::Warn, 100);
        assert_eq!(policy.evaluate(Severity::Warn, 1), Some(FlushTrigger::Severity));
        assert_eq!(policy.evaluate(Severity::Error, 2), Some(FlushTrigger::Severity));
    }

    #[test]
    fn severity_wins_when_both_fire() {
        let policy = DispatchPolicy::new(Severity::Error, 1);
        assert_eq!(policy.evaluate(Severity::Error, 1), Some(FlushTrigger::Severity));
    }
}
