use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use klances_types::LogLine;

/// Thread-safe ring buffer for the log lines of one pod
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage
    lines: Arc<RwLock<VecDeque<LogLine>>>,

    /// Maximum capacity
    capacity: usize,

    /// Next sequence number
    next_seq: Arc<AtomicU64>,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity (at least one line)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push a new line, evicting the oldest if at capacity
    pub fn push(&self, mut line: LogLine) {
        line.seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut lines = self.lines.write();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Get all lines, oldest first
    pub fn all(&self) -> Vec<LogLine> {
        self.lines.read().iter().cloned().collect()
    }

    /// Get the last N lines, oldest first
    pub fn tail(&self, n: usize) -> Vec<LogLine> {
        let lines = self.lines.read();
        let start = lines.len().saturating_sub(n);
        lines.iter().skip(start).cloned().collect()
    }

    /// Get lines in a range (for scrolling)
    pub fn range(&self, start: usize, count: usize) -> Vec<LogLine> {
        let lines = self.lines.read();
        lines.iter().skip(start).take(count).cloned().collect()
    }

    /// Total lines ever pushed, evicted ones included
    pub fn total_pushed(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[LogLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_evicts_oldest_beyond_capacity() {
        let buffer = LogBuffer::new(3);
        for i in 0..7 {
            buffer.push(LogLine::new(format!("line {}", i)));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(texts(&buffer.all()), vec!["line 4", "line 5", "line 6"]);
        assert_eq!(buffer.total_pushed(), 7);

        let seqs: Vec<u64> = buffer.all().iter().map(|l| l.seq).collect();
        assert_eq!(seqs, vec![4, 5, 6]);
    }

    #[test]
    fn test_under_capacity_keeps_everything() {
        let buffer = LogBuffer::new(10);
        buffer.push(LogLine::new("a"));
        buffer.push(LogLine::new("b"));
        assert_eq!(texts(&buffer.all()), vec!["a", "b"]);
    }

    #[test]
    fn test_tail_and_range() {
        let buffer = LogBuffer::new(5);
        for i in 0..5 {
            buffer.push(LogLine::new(i.to_string()));
        }

        assert_eq!(texts(&buffer.tail(2)), vec!["3", "4"]);
        assert_eq!(texts(&buffer.tail(50)).len(), 5);
        assert_eq!(texts(&buffer.range(1, 2)), vec!["1", "2"]);
    }

    #[test]
    fn test_zero_capacity_still_keeps_latest() {
        let buffer = LogBuffer::new(0);
        buffer.push(LogLine::new("first"));
        buffer.push(LogLine::new("second"));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(texts(&buffer.all()), vec!["second"]);
    }
}
