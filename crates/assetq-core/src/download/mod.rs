//! Download domain types, events, and errors.
//!
//! Pure data types for the download system. No I/O, networking, or runtime
//! dependencies allowed.
//!
//! # Structure
//!
//! - `task` - The immutable request value (`DownloadTask`)
//! - `result` - Terminal outcome and in-flight progress samples
//! - `events` - The lifecycle event union and run summary
//! - `errors` - Error types for download operations

pub mod errors;
pub mod events;
pub mod result;
pub mod task;

// Re-export commonly used types
pub use errors::{DownloadError, DownloadOutcome};
pub use events::{DownloadEvent, RunSummary};
pub use result::{DownloadProgress, DownloadResult};
pub use task::DownloadTask;
