//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the scheduler and cache expect from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No runtime-specific types (cancellation tokens, channels) in signatures
//! - Releases are fire-and-forget; loads and fetches are async
//! - Event emission never blocks

pub mod asset_backend;
pub mod content_downloader;
pub mod download_event_emitter;

pub use asset_backend::{AssetBackendPort, BackendError, FetchHandle, FetchSnapshot, FetchState};
pub use content_downloader::ContentDownloaderPort;
pub use download_event_emitter::{DownloadEventEmitterPort, NoopDownloadEmitter};
