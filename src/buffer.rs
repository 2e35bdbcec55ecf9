use crate::record::LogRecord;

/// Ordered holding area for records awaiting delivery.
///
/// The buffer only ever shrinks from the front, by the number of records a
/// transport confirmed. Everything behind the confirmed prefix keeps its
/// relative order so the next flush retries it chronologically.
#[derive(Debug)]
pub struct RecordBuffer {
    records: Vec<LogRecord>,
    capacity: usize,
    next_sequence: u64,
}

impl RecordBuffer {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Vec::with_capacity(capacity.saturating_add(1).min(4096)),
            capacity,
            next_sequence: 1,
        }
    }

    /// Append a record and stamp it with the next sequence number.
    ///
    /// Never fails and never evicts; the length may go past `capacity`
    /// when the caller evaluates the flush trigger after appending.
    pub fn append(&mut self, mut record: LogRecord) {
        record.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.push(record);
    }

    /// Remove the first `count` records.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the buffered length. The flush engine only
    /// drains what a write confirmed out of the current batch, so reaching
    /// this is a logic error.
    pub fn drain_prefix(&mut self, count: usize) {
        assert!(
            count <= self.records.len(),
            "drain_prefix({}) exceeds buffered length {}",
            count,
            self.records.len()
        );
        self.records.drain(..count);
    }

    /// Ordered view of everything currently buffered.
    pub fn snapshot(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Severity;

    fn record(message: &str) -> LogRecord {
        LogRecord::capture(Severity::Info, Some(message.to_string()))
    }

    fn messages(buffer: &RecordBuffer) -> Vec<String> {
        buffer
            .snapshot()
            .iter()
            .map(|r| r.message.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn append_stamps_increasing_sequence() {
        let mut buffer = RecordBuffer::new(4);
        buffer.append(record("a"));
        buffer.append(record("b"));
        buffer.append(record("c"));

        let sequences: Vec<u64> = buffer.snapshot().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn append_may_exceed_capacity() {
        let mut buffer = RecordBuffer::new(2);
        buffer.append(record("a"));
        buffer.append(record("b"));
        assert!(buffer.is_full());
        buffer.append(record("c"));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn drain_prefix_keeps_remainder_in_order() {
        let mut buffer = RecordBuffer::new(8);
        for m in ["a", "b", "c", "d", "e"] {
            buffer.append(record(m));
        }

        buffer.drain_prefix(3);
        assert_eq!(messages(&buffer), vec!["d", "e"]);

        buffer.drain_prefix(0);
        assert_eq!(messages(&buffer), vec!["d", "e"]);
    }

    #[test]
    fn sequence_continues_after_drain() {
        let mut buffer = RecordBuffer::new(8);
        buffer.append(record("a"));
        buffer.drain_prefix(1);
        buffer.append(record("b"));
        assert_eq!(buffer.snapshot()[0].sequence, 2);
    }

    #[test]
    #[should_panic(expected = "exceeds buffered length")]
    fn drain_past_end_is_fatal() {
        let mut buffer = RecordBuffer::new(8);
        buffer.append(record("a"));
        buffer.drain_prefix(2);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let buffer = RecordBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.is_empty());
    }
}
