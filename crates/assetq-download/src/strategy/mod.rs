//! Retry and concurrency policy.
//!
//! The service consults a [`RetryStrategy`] after every finished execution and
//! whenever it fills the active set. Strategies are stateless so they can be
//! shared freely and swapped at construction time.

use std::time::Duration;

use assetq_core::{DownloadResult, DownloadSettings, DownloadTask};

/// Policy deciding retries and the concurrency cap.
pub trait RetryStrategy: Send + Sync {
    /// Whether a finished execution should be re-enqueued.
    fn should_retry(&self, task: &DownloadTask, result: &DownloadResult) -> bool;

    /// Maximum number of executions allowed at once.
    fn max_concurrent_downloads(&self) -> usize;

    /// How long to wait before re-enqueuing a retried task.
    fn retry_delay(&self, _task: &DownloadTask) -> Duration {
        Duration::ZERO
    }
}

/// Retries failures immediately while the task is under its retry budget.
#[derive(Debug, Clone)]
pub struct DefaultRetryStrategy {
    max_concurrent: usize,
    auto_retry: bool,
    max_retry_count: u32,
}

impl DefaultRetryStrategy {
    /// Build the strategy from settings.
    pub fn new(settings: &DownloadSettings) -> Self {
        Self {
            max_concurrent: usize::try_from(settings.max_concurrent_downloads)
                .unwrap_or(usize::MAX)
                .max(1),
            auto_retry: settings.auto_retry_on_fail,
            max_retry_count: settings.max_retry_count,
        }
    }
}

impl Default for DefaultRetryStrategy {
    fn default() -> Self {
        Self::new(&DownloadSettings::default())
    }
}

impl RetryStrategy for DefaultRetryStrategy {
    fn should_retry(&self, task: &DownloadTask, result: &DownloadResult) -> bool {
        !result.success && self.auto_retry && task.retry_count() < self.max_retry_count
    }

    fn max_concurrent_downloads(&self) -> usize {
        self.max_concurrent
    }
}

/// Default retry decisions with an exponential delay between attempts.
///
/// The delay before retry `n` is `base * 2^n`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct BackoffRetryStrategy {
    inner: DefaultRetryStrategy,
    base_delay: Duration,
    max_delay: Duration,
}

impl BackoffRetryStrategy {
    /// Wrap the default decisions with backoff.
    pub fn new(settings: &DownloadSettings, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            inner: DefaultRetryStrategy::new(settings),
            base_delay,
            max_delay,
        }
    }
}

impl RetryStrategy for BackoffRetryStrategy {
    fn should_retry(&self, task: &DownloadTask, result: &DownloadResult) -> bool {
        self.inner.should_retry(task, result)
    }

    fn max_concurrent_downloads(&self) -> usize {
        self.inner.max_concurrent_downloads()
    }

    fn retry_delay(&self, task: &DownloadTask) -> Duration {
        let factor = 1u32.checked_shl(task.retry_count()).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
