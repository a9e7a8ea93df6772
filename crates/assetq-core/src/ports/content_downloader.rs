//! Content downloader port.
//!
//! The narrow view of the download scheduler that the asset cache needs for
//! its "needs download" pre-check. Keeping it a port means the cache never
//! depends on the scheduler's concrete type or its locks.

use async_trait::async_trait;

use crate::download::{DownloadError, DownloadResult};

/// Port for scheduling a label download and awaiting its terminal result.
#[async_trait]
pub trait ContentDownloaderPort: Send + Sync {
    /// Bytes that still need to be fetched for `label`.
    async fn download_size(&self, label: &str) -> Result<u64, DownloadError>;

    /// Enqueue `label` and wait for its terminal result.
    ///
    /// A terminal failure is returned as `Ok` with `success == false`;
    /// `Err` is reserved for validation errors and cancellation.
    async fn download(&self, label: &str, priority: i32) -> Result<DownloadResult, DownloadError>;
}
