//! Download settings and validation.
//!
//! Settings are process-wide and read-only once handed to the scheduler.
//! Every field has a default so partial JSON documents are accepted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default concurrency cap.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: u32 = 3;

/// Default retry budget.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 3;

/// Default executor poll cadence in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Download scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DownloadSettings {
    /// Maximum number of downloads executing at once (>= 1).
    pub max_concurrent_downloads: u32,

    /// Re-enqueue failed downloads automatically.
    pub auto_retry_on_fail: bool,

    /// Ceiling on a task's retry count before a failure becomes terminal.
    pub max_retry_count: u32,

    /// How often the executor samples an in-flight fetch.
    pub progress_poll_interval_ms: u64,

    /// Capacity of the event channel; slow subscribers skip older events.
    pub event_buffer: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            auto_retry_on_fail: true,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            progress_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl DownloadSettings {
    /// Set the concurrency cap.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent_downloads = max;
        self
    }

    /// Enable or disable automatic retry.
    #[must_use]
    pub const fn with_auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry_on_fail = enabled;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = count;
        self
    }

    /// Set the executor poll interval.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.progress_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub const fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// The poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_interval_ms)
    }

    /// Load settings from a JSON file and validate them.
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let settings: Self =
            serde_json::from_str(&content).map_err(|e| SettingsError::Parse(e.to_string()))?;
        validate_settings(&settings)?;

        tracing::debug!(
            path = %path.display(),
            max_concurrent = settings.max_concurrent_downloads,
            auto_retry = settings.auto_retry_on_fail,
            max_retry = settings.max_retry_count,
            "Loaded download settings"
        );

        Ok(settings)
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Max concurrent downloads must be at least 1, got {0}")]
    InvalidMaxConcurrent(u32),

    #[error("Progress poll interval must be at least 1ms, got {0}")]
    InvalidPollInterval(u64),

    #[error("Event buffer must hold at least one event, got {0}")]
    InvalidEventBuffer(usize),

    #[error("Cannot read settings file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid settings JSON: {0}")]
    Parse(String),
}

/// Validate settings values.
pub const fn validate_settings(settings: &DownloadSettings) -> Result<(), SettingsError> {
    if settings.max_concurrent_downloads < 1 {
        return Err(SettingsError::InvalidMaxConcurrent(
            settings.max_concurrent_downloads,
        ));
    }

    if settings.progress_poll_interval_ms < 1 {
        return Err(SettingsError::InvalidPollInterval(
            settings.progress_poll_interval_ms,
        ));
    }

    if settings.event_buffer < 1 {
        return Err(SettingsError::InvalidEventBuffer(settings.event_buffer));
    }

    Ok(())
}
