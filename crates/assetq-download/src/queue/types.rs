//! Queue item types (internal implementation).

use assetq_core::DownloadTask;

/// A task waiting in the queue.
#[derive(Clone, Debug)]
pub struct QueuedItem {
    /// The queued task.
    pub task: DownloadTask,
    /// Monotonic insertion sequence; breaks priority ties FIFO.
    pub seq: u64,
}

impl QueuedItem {
    /// Create a new queued item.
    pub const fn new(task: DownloadTask, seq: u64) -> Self {
        Self { task, seq }
    }

    /// Whether this item should be dequeued before `other`.
    pub const fn runs_before(&self, other: &Self) -> bool {
        let (a, b) = (self.task.priority(), other.task.priority());
        a > b || (a == b && self.seq < other.seq)
    }
}

/// Result of an `enqueue` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new entry was added at the given 1-based position.
    Queued {
        /// Position in dequeue order.
        position: usize,
    },
    /// The label was already queued; the existing entry was kept with the
    /// higher of the two priorities.
    Merged {
        /// Priority of the surviving entry.
        priority: i32,
    },
}

impl EnqueueOutcome {
    /// Whether a new entry was added.
    pub const fn is_new(self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}
