//! Download scheduler for assetq.
//!
//! Accepts labeled content requests, orders them by priority, runs them
//! against the asset backend under a concurrency cap, retries failures, and
//! reports lifecycle events and aggregate progress.
//!
//! # Modules
//!
//! - `queue` - Priority queue with stable FIFO ordering on ties
//! - `executor` - Runs one download against the backend
//! - `strategy` - Retry and concurrency policy
//! - `progress` - Aggregate progress counters
//! - `manager` - The download service and its run loop
//! - `catalog` - Catalog update checks and cache-storage clearing

#![deny(unused_crate_dependencies)]

// Re-export core types for convenience
pub use assetq_core::download::{
    DownloadError, DownloadEvent, DownloadProgress, DownloadResult, DownloadTask, RunSummary,
};
pub use assetq_core::ports::{ContentDownloaderPort, DownloadEventEmitterPort};

pub mod catalog;
pub mod executor;
pub mod progress;
pub mod queue;
pub mod strategy;

// Public API - download service
mod manager;

pub use catalog::{CatalogError, CatalogManager, CatalogUpdate};
pub use executor::{DownloadExecutor, ProgressCallback};
pub use manager::{DownloadService, DownloadServiceDeps, WORKER_PANICKED, build_download_service};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use queue::{DownloadQueue, EnqueueOutcome};
pub use strategy::{BackoffRetryStrategy, DefaultRetryStrategy, RetryStrategy};

// Dev-dependencies used only by unit or integration tests
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tokio_test as _;
