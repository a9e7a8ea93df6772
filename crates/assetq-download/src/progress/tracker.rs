//! Aggregate progress counters.
//!
//! The tracker is fed from the service (queue/start/complete transitions) and
//! from executor progress callbacks, which run synchronously inside spawned
//! tasks. Its state therefore sits behind a short-lived std mutex and is
//! published through a `watch` channel after every change.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use assetq_core::{DownloadProgress, DownloadResult};

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Executions in flight.
    pub active: usize,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Cumulative bytes observed through progress samples.
    pub downloaded_bytes: u64,
    /// Cumulative size of successfully completed downloads.
    pub total_bytes: u64,
    /// `downloaded_bytes / total_bytes` clamped to `[0, 1]` (0 when total is 0).
    pub overall_fraction: f32,
}

#[derive(Debug, Default)]
struct Counters {
    active: usize,
    queued: usize,
    downloaded: u64,
    total: u64,
    /// Highest byte count reported per label. Survives failed attempts so
    /// a retry only contributes bytes beyond what was already counted.
    high_water: HashMap<String, u64>,
}

impl Counters {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn snapshot(&self) -> ProgressSnapshot {
        let overall_fraction = if self.total == 0 {
            0.0
        } else {
            (self.downloaded as f64 / self.total as f64).clamp(0.0, 1.0) as f32
        };

        ProgressSnapshot {
            active: self.active,
            queued: self.queued,
            downloaded_bytes: self.downloaded,
            total_bytes: self.total,
            overall_fraction,
        }
    }
}

/// Aggregate progress across all downloads of the service.
#[derive(Debug)]
pub struct ProgressTracker {
    counters: Mutex<Counters>,
    tx: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Create a tracker with all counters at zero.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self {
            counters: Mutex::new(Counters::default()),
            tx,
        }
    }

    /// A task entered the queue.
    pub fn on_download_queued(&self) {
        self.update(|c| c.queued = c.queued.saturating_add(1));
    }

    /// A task left the queue and started executing.
    pub fn on_download_started(&self, label: &str) {
        self.update(|c| {
            c.active = c.active.saturating_add(1);
            c.queued = c.queued.saturating_sub(1);
            c.high_water.entry(label.to_string()).or_insert(0);
        });
    }

    /// A progress sample arrived. Only the increase over the last sample for
    /// the same label is added; samples that go backwards are ignored.
    pub fn on_download_progress(&self, progress: &DownloadProgress) {
        self.update(|c| {
            let mark = c.high_water.entry(progress.label.clone()).or_insert(0);
            if progress.downloaded_bytes > *mark {
                let delta = progress.downloaded_bytes - *mark;
                *mark = progress.downloaded_bytes;
                c.downloaded = c.downloaded.saturating_add(delta);
            }
        });
    }

    /// An execution finished (successfully or not).
    pub fn on_download_completed(&self, result: &DownloadResult) {
        self.update(|c| {
            c.active = c.active.saturating_sub(1);
            if result.success {
                c.total = c.total.saturating_add(result.size);
                c.high_water.remove(&result.label);
            }
        });
    }

    /// `label` failed for good; drop its high-water mark.
    pub fn on_download_abandoned(&self, label: &str) {
        self.update(|c| {
            c.high_water.remove(label);
        });
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.update(|c| *c = Counters::default());
    }

    /// Current counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Executions in flight.
    pub fn active_count(&self) -> usize {
        self.tx.borrow().active
    }

    /// Tasks waiting in the queue.
    pub fn queued_count(&self) -> usize {
        self.tx.borrow().queued
    }

    /// Overall completion fraction in `[0, 1]`.
    pub fn overall_fraction(&self) -> f32 {
        self.tx.borrow().overall_fraction
    }

    /// Subscribe to snapshot changes.
    pub fn watch(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut Counters)) {
        let mut counters = self.lock();
        f(&mut counters);
        // Publish while holding the lock so snapshots are never reordered.
        self.tx.send_replace(counters.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: &str, downloaded: u64, total: u64) -> DownloadProgress {
        DownloadProgress {
            label: label.to_string(),
            fraction: 0.0,
            downloaded_bytes: downloaded,
            total_bytes: total,
        }
    }

    #[test]
    fn test_started_moves_from_queued_to_active() {
        let tracker = ProgressTracker::new();
        tracker.on_download_queued();
        tracker.on_download_queued();
        tracker.on_download_started("a");

        assert_eq!(tracker.active_count(), 1);
        assert_eq!(tracker.queued_count(), 1);
    }

    #[test]
    fn test_progress_adds_only_increases() {
        let tracker = ProgressTracker::new();
        tracker.on_download_started("a");
        tracker.on_download_progress(&sample("a", 10, 100));
        tracker.on_download_progress(&sample("a", 10, 100));
        tracker.on_download_progress(&sample("a", 40, 100));
        tracker.on_download_progress(&sample("a", 30, 100));

        assert_eq!(tracker.snapshot().downloaded_bytes, 40);
    }

    #[test]
    fn test_labels_tracked_independently() {
        let tracker = ProgressTracker::new();
        tracker.on_download_started("a");
        tracker.on_download_started("b");
        tracker.on_download_progress(&sample("a", 50, 100));
        tracker.on_download_progress(&sample("b", 20, 100));
        tracker.on_download_progress(&sample("a", 60, 100));

        assert_eq!(tracker.snapshot().downloaded_bytes, 80);
    }

    #[test]
    fn test_retry_does_not_double_count() {
        let tracker = ProgressTracker::new();
        tracker.on_download_started("a");
        tracker.on_download_progress(&sample("a", 50, 100));
        tracker.on_download_completed(&DownloadResult::failed("a", "boom"));

        tracker.on_download_started("a");
        tracker.on_download_progress(&sample("a", 30, 100));
        tracker.on_download_progress(&sample("a", 100, 100));
        tracker.on_download_completed(&DownloadResult::succeeded("a", 100));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.downloaded_bytes, 100);
        assert_eq!(snapshot.total_bytes, 100);
        assert!((snapshot.overall_fraction - 1.0).abs() < f32::EPSILON);
        assert_eq!(snapshot.active, 0);
    }

    #[test]
    fn test_abandoned_label_starts_fresh() {
        let tracker = ProgressTracker::new();
        tracker.on_download_started("a");
        tracker.on_download_progress(&sample("a", 50, 100));
        tracker.on_download_completed(&DownloadResult::failed("a", "boom"));
        tracker.on_download_abandoned("a");

        // A later request for the same label counts its own bytes.
        tracker.on_download_started("a");
        tracker.on_download_progress(&sample("a", 30, 100));

        assert_eq!(tracker.snapshot().downloaded_bytes, 80);
        assert!(tracker.lock().high_water.contains_key("a"));
        tracker.on_download_abandoned("a");
        assert!(tracker.lock().high_water.is_empty());
    }

    #[test]
    fn test_failure_does_not_add_total() {
        let tracker = ProgressTracker::new();
        tracker.on_download_started("a");
        tracker.on_download_completed(&DownloadResult::failed("a", "boom"));

        assert_eq!(tracker.snapshot().total_bytes, 0);
        assert_eq!(tracker.overall_fraction(), 0.0);
    }

    #[test]
    fn test_fraction_is_clamped() {
        let tracker = ProgressTracker::new();
        tracker.on_download_started("a");
        tracker.on_download_progress(&sample("a", 80, 80));
        tracker.on_download_completed(&DownloadResult::succeeded("a", 80));
        tracker.on_download_started("b");
        tracker.on_download_progress(&sample("b", 40, 80));

        // 120 downloaded vs 80 completed.
        assert!((tracker.overall_fraction() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_counters_saturate_at_zero() {
        let tracker = ProgressTracker::new();
        tracker.on_download_started("a");
        tracker.on_download_completed(&DownloadResult::succeeded("a", 0));
        tracker.on_download_completed(&DownloadResult::succeeded("a", 0));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.active, 0);
        assert_eq!(snapshot.queued, 0);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let tracker = ProgressTracker::new();
        tracker.on_download_queued();
        tracker.on_download_started("a");
        tracker.on_download_progress(&sample("a", 10, 10));
        tracker.reset();

        assert_eq!(tracker.snapshot(), ProgressSnapshot::default());
    }

    #[tokio::test]
    async fn test_watch_sees_updates() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.watch();

        tracker.on_download_queued();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().queued, 1);
    }
}
