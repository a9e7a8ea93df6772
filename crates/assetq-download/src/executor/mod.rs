//! Download execution.
//!
//! The executor runs exactly one task against the asset backend: it queries
//! the outstanding size, starts a fetch, samples it on a fixed cadence, and
//! reports a terminal [`DownloadResult`]. It knows nothing about queues,
//! retries, or events.
//!
//! Cancellation is handled via `tokio::select!` around every backend await
//! and poll wait. A cancelled execution always yields
//! `Err(DownloadError::Cancelled)` and never a failed result.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use assetq_core::{
    AssetBackendPort, DownloadError, DownloadProgress, DownloadResult, DownloadTask, FetchState,
};

/// Callback receiving progress samples for the running execution.
pub type ProgressCallback = dyn Fn(DownloadProgress) + Send + Sync;

/// Runs single downloads against the asset backend.
#[derive(Clone)]
pub struct DownloadExecutor {
    backend: Arc<dyn AssetBackendPort>,
    poll_interval: Duration,
}

impl DownloadExecutor {
    /// Create an executor that samples in-flight fetches every `poll_interval`.
    pub fn new(backend: Arc<dyn AssetBackendPort>, poll_interval: Duration) -> Self {
        Self {
            backend,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Bytes still to be fetched for `label`.
    pub async fn download_size(
        &self,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(DownloadError::Cancelled),
            size = self.backend.download_size(label) => Ok(size?),
        }
    }

    /// Run `task` to a terminal result.
    ///
    /// Content that is already local (size 0) completes immediately without
    /// any progress samples. Otherwise every poll produces one sample, even
    /// when nothing changed since the previous one.
    pub async fn execute(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
        on_progress: &ProgressCallback,
    ) -> Result<DownloadResult, DownloadError> {
        let label = task.label();
        let size = self.download_size(label, cancel).await?;

        if size == 0 {
            tracing::debug!(label = %label, "Content already local, skipping fetch");
            return Ok(DownloadResult::succeeded(label, 0));
        }

        let handle = tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            handle = self.backend.begin_fetch(label) => handle?,
        };

        tracing::debug!(label = %label, size, "Fetch started");

        let mut tick = interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut high_water = 0.0_f32;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    handle.release();
                    return Err(DownloadError::Cancelled);
                }

                _ = tick.tick() => {}
            }

            let snapshot = handle.snapshot();
            let fraction = match snapshot.state {
                FetchState::Succeeded => 1.0,
                _ if snapshot.percent_complete.is_nan() => high_water,
                _ => snapshot.percent_complete,
            };
            // Keep samples monotonic within one execution.
            high_water = high_water.max(fraction.clamp(0.0, 1.0));
            on_progress(DownloadProgress::from_fraction(label, high_water, size));

            match snapshot.state {
                FetchState::InProgress => {}
                FetchState::Succeeded => {
                    handle.release();
                    return Ok(DownloadResult::succeeded(label, size));
                }
                FetchState::Failed(message) => {
                    handle.release();
                    tracing::debug!(label = %label, error = %message, "Fetch failed");
                    return Ok(DownloadResult::failed(label, message));
                }
            }
        }
    }
}
