//! Progress tracking.
//!
//! This module aggregates per-download progress samples into service-wide
//! counters.

mod tracker;

pub use tracker::{ProgressSnapshot, ProgressTracker};
