//! Core domain types and port definitions for assetq.
//!
//! This crate holds everything the download scheduler and the asset cache
//! agree on: task/result/progress values, settings, the download event union,
//! error types, and the port traits the concrete asset backend implements.
//!
//! No runtime, networking, or storage dependencies live here.
//!
//! # Modules
//!
//! - `download` - Task, result and progress values, errors and events
//! - `resource` - Opaque handles for loaded resources and instances
//! - `ports` - Trait abstractions for the backend, event sinks and downloaders
//! - `settings` - Download settings with defaults and validation
//! - `testing` - Scriptable in-memory backend (`test-utils` feature)

#![deny(unused_crate_dependencies)]

pub mod download;
pub mod ports;
pub mod resource;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use download::{
    DownloadError, DownloadEvent, DownloadProgress, DownloadResult, DownloadTask, RunSummary,
};
pub use ports::{
    AssetBackendPort, BackendError, ContentDownloaderPort, DownloadEventEmitterPort, FetchHandle,
    FetchSnapshot, FetchState, NoopDownloadEmitter,
};
pub use resource::{HandleId, InstanceHandle, InstanceId, ResourceHandle};
pub use settings::{
    DEFAULT_EVENT_BUFFER, DEFAULT_MAX_CONCURRENT_DOWNLOADS, DEFAULT_MAX_RETRY_COUNT,
    DEFAULT_POLL_INTERVAL_MS, DownloadSettings, SettingsError, validate_settings,
};

// Dev-dependencies used only by integration-style tests in this crate
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio as _;
