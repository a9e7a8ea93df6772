//! Reference-counted asset cache for assetq.
//!
//! Loads resources through the asset backend, hands out the same handle to
//! every holder of a key, and releases the backend resource exactly once when
//! the last holder lets go. Instantiated objects are tracked separately by
//! identity.
//!
//! When a [`ContentDownloaderPort`](assetq_core::ContentDownloaderPort) is
//! attached, a cache miss first downloads any content the backend reports as
//! not yet local.

#![deny(unused_crate_dependencies)]

mod cache;
mod entry;
mod error;

pub use cache::AssetCache;
pub use entry::CacheKey;
pub use error::CacheError;

// Dev-dependencies used only by integration tests
#[cfg(test)]
use assetq_download as _;
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
