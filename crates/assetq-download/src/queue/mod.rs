//! Priority download queue.
//!
//! A pure state machine: no async, no I/O, no tracing. The download service
//! owns the queue behind its own lock.
//!
//! # Ordering
//!
//! Items dequeue by descending priority. Items of equal priority dequeue in
//! insertion order, which is made stable by a monotonic sequence number
//! rather than by relying on the container.
//!
//! # Duplicate labels
//!
//! A label is queued at most once. Enqueuing a label that is already waiting
//! keeps the existing entry (and its place among equal priorities) and raises
//! its priority if the new request is more urgent.

mod types;

use std::collections::VecDeque;

use assetq_core::DownloadTask;

pub use types::{EnqueueOutcome, QueuedItem};

/// Pending downloads ordered by priority.
///
/// This is a sync type with no internal locking; the caller is responsible
/// for synchronization.
#[derive(Debug, Default)]
pub struct DownloadQueue {
    /// Kept sorted in dequeue order.
    pending: VecDeque<QueuedItem>,
    next_seq: u64,
}

impl DownloadQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            next_seq: 0,
        }
    }

    /// Number of waiting tasks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `label` is waiting.
    pub fn contains(&self, label: &str) -> bool {
        self.pending.iter().any(|item| item.task.label() == label)
    }

    /// Add a task.
    pub fn enqueue(&mut self, task: DownloadTask) -> EnqueueOutcome {
        if let Some(idx) = self.index_of(task.label()) {
            return self.merge_at(idx, task.priority());
        }

        let item = QueuedItem::new(task, self.next_seq);
        self.next_seq += 1;
        let position = self.insert_sorted(item);

        EnqueueOutcome::Queued {
            position: position + 1,
        }
    }

    /// Remove and return the most urgent task.
    pub fn try_dequeue(&mut self) -> Option<DownloadTask> {
        self.pending.pop_front().map(|item| item.task)
    }

    /// Remove and return the most urgent task that `eligible` accepts.
    ///
    /// Rejected tasks keep their place in the queue.
    pub fn try_dequeue_where(
        &mut self,
        eligible: impl Fn(&DownloadTask) -> bool,
    ) -> Option<DownloadTask> {
        let idx = self.pending.iter().position(|item| eligible(&item.task))?;
        self.pending.remove(idx).map(|item| item.task)
    }

    /// Discard every waiting task. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    /// Waiting tasks in dequeue order.
    pub fn iter(&self) -> impl Iterator<Item = &DownloadTask> {
        self.pending.iter().map(|item| &item.task)
    }

    /// Waiting labels in dequeue order.
    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|task| task.label().to_string()).collect()
    }

    // --- Private helpers ---

    fn index_of(&self, label: &str) -> Option<usize> {
        self.pending
            .iter()
            .position(|item| item.task.label() == label)
    }

    fn merge_at(&mut self, idx: usize, priority: i32) -> EnqueueOutcome {
        let Some(existing) = self.pending.get(idx) else {
            return EnqueueOutcome::Merged { priority };
        };
        if priority <= existing.task.priority() {
            return EnqueueOutcome::Merged {
                priority: existing.task.priority(),
            };
        }

        // Raising priority can only move the entry forward; re-insert it.
        if let Some(mut item) = self.pending.remove(idx) {
            item.task = item.task.with_priority(priority);
            self.insert_sorted(item);
        }
        EnqueueOutcome::Merged { priority }
    }

    /// Insert keeping dequeue order; returns the 0-based index used.
    fn insert_sorted(&mut self, item: QueuedItem) -> usize {
        let idx = self
            .pending
            .iter()
            .position(|queued| item.runs_before(queued))
            .unwrap_or(self.pending.len());
        self.pending.insert(idx, item);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut DownloadQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.try_dequeue())
            .map(|task| task.label().to_string())
            .collect()
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = DownloadQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_highest_priority_first() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("A", 1));
        queue.enqueue(DownloadTask::new("B", 5));
        queue.enqueue(DownloadTask::new("C", 1));

        assert_eq!(drain(&mut queue), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_fifo_among_equal_priorities() {
        let mut queue = DownloadQueue::new();
        for label in ["one", "two", "three", "four"] {
            queue.enqueue(DownloadTask::new(label, 0));
        }

        assert_eq!(drain(&mut queue), vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_negative_priorities_sort_last() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("background", -10));
        queue.enqueue(DownloadTask::new("normal", 0));
        queue.enqueue(DownloadTask::new("urgent", i32::MAX));

        assert_eq!(drain(&mut queue), vec!["urgent", "normal", "background"]);
    }

    #[test]
    fn test_dequeue_order_is_non_increasing() {
        let mut queue = DownloadQueue::new();
        let priorities = [3, -1, 7, 3, 0, 7, 2, -1, 5, 3];
        for (i, p) in priorities.iter().enumerate() {
            queue.enqueue(DownloadTask::new(format!("t{i}"), *p));
        }

        let mut last: Option<(i32, usize)> = None;
        while let Some(task) = queue.try_dequeue() {
            let idx: usize = task.label()[1..].parse().unwrap();
            if let Some((prev_p, prev_idx)) = last {
                assert!(task.priority() <= prev_p);
                if task.priority() == prev_p {
                    assert!(idx > prev_idx, "FIFO violated for equal priority");
                }
            }
            last = Some((task.priority(), idx));
        }
    }

    #[test]
    fn test_dequeue_where_skips_rejected_tasks() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("busy", 9));
        queue.enqueue(DownloadTask::new("a", 1));
        queue.enqueue(DownloadTask::new("b", 1));

        let task = queue.try_dequeue_where(|t| t.label() != "busy").unwrap();
        assert_eq!(task.label(), "a");
        assert_eq!(queue.labels(), vec!["busy", "b"]);

        assert!(queue.try_dequeue_where(|_| false).is_none());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_enqueue_reports_position() {
        let mut queue = DownloadQueue::new();
        assert_eq!(
            queue.enqueue(DownloadTask::new("a", 1)),
            EnqueueOutcome::Queued { position: 1 }
        );
        assert_eq!(
            queue.enqueue(DownloadTask::new("b", 9)),
            EnqueueOutcome::Queued { position: 1 }
        );
        assert_eq!(
            queue.enqueue(DownloadTask::new("c", 1)),
            EnqueueOutcome::Queued { position: 3 }
        );
    }

    #[test]
    fn test_duplicate_label_merges() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("a", 1));
        queue.enqueue(DownloadTask::new("b", 1));

        let outcome = queue.enqueue(DownloadTask::new("a", 0));
        assert_eq!(outcome, EnqueueOutcome::Merged { priority: 1 });
        assert!(!outcome.is_new());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.labels(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_label_raises_priority() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("a", 1));
        queue.enqueue(DownloadTask::new("b", 3));
        queue.enqueue(DownloadTask::new("c", 3));

        let outcome = queue.enqueue(DownloadTask::new("a", 3));
        assert_eq!(outcome, EnqueueOutcome::Merged { priority: 3 });

        // "a" keeps its original insertion sequence, so it now leads its tier.
        assert_eq!(drain(&mut queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_keeps_retry_count() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("a", 1).with_retry());
        queue.enqueue(DownloadTask::new("a", 4));

        let task = queue.try_dequeue().unwrap();
        assert_eq!(task.priority(), 4);
        assert_eq!(task.retry_count(), 1);
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("a", 1));
        queue.enqueue(DownloadTask::new("b", 2));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(!queue.contains("a"));
    }

    #[test]
    fn test_iter_matches_dequeue_order() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("low", 0));
        queue.enqueue(DownloadTask::new("high", 10));

        let snapshot: Vec<_> = queue.iter().map(DownloadTask::priority).collect();
        assert_eq!(snapshot, vec![10, 0]);
        assert!(queue.contains("low"));
        assert_eq!(drain(&mut queue), vec!["high", "low"]);
    }

    #[test]
    fn test_requeue_after_dequeue_goes_to_back_of_tier() {
        let mut queue = DownloadQueue::new();
        queue.enqueue(DownloadTask::new("a", 1));
        queue.enqueue(DownloadTask::new("b", 1));

        let a = queue.try_dequeue().unwrap();
        queue.enqueue(a.with_retry());

        assert_eq!(drain(&mut queue), vec!["b", "a"]);
    }
}
