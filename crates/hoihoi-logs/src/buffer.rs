use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use hoihoi_types::{LogLine, SharedLogLine};

/// Read position in a [`LogBuffer`], used to fetch only what changed since
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferCursor {
    /// Clear count when the cursor was taken
    epoch: u64,
    /// Sequence number of the oldest retained line
    first_seq: u64,
    /// Sequence number the next pushed line gets
    end_seq: u64,
}

/// Lines that changed since a [`BufferCursor`]
#[derive(Clone, Debug, PartialEq)]
pub enum BufferDelta {
    /// Only pushes happened; these lines follow the ones already seen
    Appended(Vec<SharedLogLine>),
    /// The buffer was cleared or evicted lines; this is its full contents
    Snapshot(Vec<SharedLogLine>),
}

#[derive(Default)]
struct Entries {
    lines: VecDeque<SharedLogLine>,
    first_seq: u64,
    epoch: u64,
}

impl Entries {
    fn cursor(&self) -> BufferCursor {
        BufferCursor {
            epoch: self.epoch,
            first_seq: self.first_seq,
            end_seq: self.first_seq + self.lines.len() as u64,
        }
    }
}

/// Append-only store of received log lines
///
/// Cloning yields another read handle onto the same lines. Only the session
/// controller appends or clears.
#[derive(Clone)]
pub struct LogBuffer {
    /// Lines in receipt order
    entries: Arc<RwLock<Entries>>,

    /// Maximum line count (None = unbounded)
    capacity: Option<usize>,
}

impl LogBuffer {
    /// Create a buffer, optionally capped at `capacity` lines
    pub fn new(capacity: Option<usize>) -> Self {
        let capacity = capacity.filter(|c| *c > 0);
        let entries = Entries {
            lines: VecDeque::with_capacity(capacity.unwrap_or(1024).min(64 * 1024)),
            ..Entries::default()
        };
        Self {
            entries: Arc::new(RwLock::new(entries)),
            capacity,
        }
    }

    /// Create a buffer that never evicts
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Push a new line, evicting the oldest if a cap is set and reached
    pub(crate) fn push(&self, line: LogLine) {
        let mut entries = self.entries.write();
        if let Some(capacity) = self.capacity {
            while entries.lines.len() >= capacity {
                entries.lines.pop_front();
                entries.first_seq += 1;
            }
        }
        entries.lines.push_back(Arc::new(line));
    }

    /// Clear all lines
    pub(crate) fn clear(&self) {
        let mut entries = self.entries.write();
        entries.first_seq += entries.lines.len() as u64;
        entries.lines.clear();
        entries.epoch += 1;
    }

    /// Snapshot of all lines (Arc clones are cheap)
    pub fn all(&self) -> Vec<SharedLogLine> {
        self.entries.read().lines.iter().cloned().collect()
    }

    /// Lines changed since `cursor`, plus the cursor to pass next time
    ///
    /// Without a cursor, or after a clear or eviction, the whole buffer is
    /// returned as a snapshot.
    pub fn read_since(&self, cursor: Option<BufferCursor>) -> (BufferDelta, BufferCursor) {
        let entries = self.entries.read();
        let now = entries.cursor();

        let delta = match cursor {
            Some(seen)
                if seen.epoch == now.epoch
                    && seen.first_seq == now.first_seq
                    && seen.end_seq <= now.end_seq =>
            {
                let start = (seen.end_seq - now.first_seq) as usize;
                BufferDelta::Appended(entries.lines.range(start..).cloned().collect())
            }
            _ => BufferDelta::Snapshot(entries.lines.iter().cloned().collect()),
        };

        (delta, now)
    }

    /// Total line count
    pub fn len(&self) -> usize {
        self.entries.read().lines.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().lines.is_empty()
    }

    /// Configured cap, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Unbounded buffer pre-filled with `lines`
impl FromIterator<LogLine> for LogBuffer {
    fn from_iter<I: IntoIterator<Item = LogLine>>(lines: I) -> Self {
        let buffer = Self::unbounded();
        for line in lines {
            buffer.push(line);
        }
        buffer
    }
}

impl std::fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("LogBuffer")
            .field("len", &entries.lines.len())
            .field("capacity", &self.capacity)
            .field("cursor", &entries.cursor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[SharedLogLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    fn appended(delta: &BufferDelta) -> Vec<&str> {
        match delta {
            BufferDelta::Appended(lines) => texts(lines),
            BufferDelta::Snapshot(_) => panic!("expected appended lines, got a snapshot"),
        }
    }

    #[test]
    fn test_push_preserves_receipt_order() {
        let buffer = LogBuffer::unbounded();
        for i in 0..500 {
            buffer.push(LogLine::new("genesis", format!("line {}", i)));
        }
        let all = buffer.all();
        assert_eq!(all.len(), 500);
        assert_eq!(all[0].text, "line 0");
        assert_eq!(all[499].text, "line 499");
        assert_eq!(buffer.capacity(), None);
    }

    #[test]
    fn test_capped_buffer_evicts_oldest() {
        let buffer = LogBuffer::new(Some(3));
        for text in ["a", "b", "c", "d", "e"] {
            buffer.push(LogLine::new("genesis", text));
        }
        assert_eq!(texts(&buffer.all()), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_zero_capacity_means_unbounded() {
        let buffer = LogBuffer::new(Some(0));
        assert_eq!(buffer.capacity(), None);
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = LogBuffer::unbounded();
        let reader = buffer.clone();
        buffer.push(LogLine::new("genesis", "a"));
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_read_since_returns_only_new_lines() {
        let buffer: LogBuffer = ["a", "b"]
            .into_iter()
            .map(|t| LogLine::new("genesis", t))
            .collect();

        let (first, cursor) = buffer.read_since(None);
        assert_eq!(first, BufferDelta::Snapshot(buffer.all()));

        let (nothing, cursor) = buffer.read_since(Some(cursor));
        assert!(appended(&nothing).is_empty());

        buffer.push(LogLine::new("genesis", "c"));
        buffer.push(LogLine::new("genesis", "d"));
        let (delta, _) = buffer.read_since(Some(cursor));
        assert_eq!(appended(&delta), vec!["c", "d"]);
    }

    #[test]
    fn test_clear_and_eviction_force_a_snapshot() {
        let buffer = LogBuffer::new(Some(2));
        buffer.push(LogLine::new("genesis", "a"));
        let (_, cursor) = buffer.read_since(None);

        buffer.push(LogLine::new("genesis", "b"));
        buffer.push(LogLine::new("genesis", "c"));
        let (delta, cursor) = buffer.read_since(Some(cursor));
        match delta {
            BufferDelta::Snapshot(lines) => assert_eq!(texts(&lines), vec!["b", "c"]),
            other => panic!("expected snapshot after eviction, got {:?}", other),
        }

        buffer.clear();
        let (delta, _) = buffer.read_since(Some(cursor));
        assert_eq!(delta, BufferDelta::Snapshot(Vec::new()));
        assert!(buffer.is_empty());
    }
}
