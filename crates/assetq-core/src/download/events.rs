//! Download events - discriminated union for all scheduler lifecycle changes.

use serde::{Deserialize, Serialize};

use super::result::{DownloadProgress, DownloadResult};

/// Single discriminated union for all download events.
///
/// Within one label's lifecycle the order is always `DownloadStarted`, then
/// zero or more `DownloadProgress`, then exactly one of `DownloadCompleted` /
/// `DownloadFailed` (per attempt that does not end in a retry). No ordering is
/// promised across labels.
///
/// Wire format uses a `type` tag:
///
/// ```json
/// { "type": "download_started", "label": "textures", "retry_count": 0 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A task moved from the queue into execution.
    DownloadStarted {
        /// Label of the download.
        label: String,
        /// Retry count of the attempt that started (0 for the first attempt).
        retry_count: u32,
    },

    /// Progress sample for an active download.
    DownloadProgress(DownloadProgress),

    /// Download completed successfully.
    DownloadCompleted(DownloadResult),

    /// Download failed terminally (retry budget exhausted or retry disabled).
    DownloadFailed(DownloadResult),

    /// The queue and the active set both drained.
    AllDownloadsCompleted {
        /// Summary of everything processed since the service left idle.
        summary: RunSummary,
    },

    /// `cancel_all` was called. Not an error event.
    DownloadsCancelled {
        /// Number of queued tasks that were discarded.
        discarded: usize,
    },
}

impl DownloadEvent {
    /// Create a download started event.
    pub fn started(label: impl Into<String>, retry_count: u32) -> Self {
        Self::DownloadStarted {
            label: label.into(),
            retry_count,
        }
    }

    /// Get the label from any per-download event.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::DownloadStarted { label, .. } => Some(label),
            Self::DownloadProgress(progress) => Some(&progress.label),
            Self::DownloadCompleted(result) | Self::DownloadFailed(result) => Some(&result.label),
            Self::AllDownloadsCompleted { .. } | Self::DownloadsCancelled { .. } => None,
        }
    }

    /// The terminal result carried by this event, if it is terminal for `label`.
    #[must_use]
    pub fn terminal_result_for(&self, label: &str) -> Option<&DownloadResult> {
        match self {
            Self::DownloadCompleted(result) | Self::DownloadFailed(result)
                if result.label == label =>
            {
                Some(result)
            }
            _ => None,
        }
    }

    /// Get the event name for wire protocols.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::DownloadStarted { .. } => "download:started",
            Self::DownloadProgress(_) => "download:progress",
            Self::DownloadCompleted(_) => "download:completed",
            Self::DownloadFailed(_) => "download:failed",
            Self::AllDownloadsCompleted { .. } => "download:all_completed",
            Self::DownloadsCancelled { .. } => "download:cancelled",
        }
    }
}

/// Summary of one busy→idle run of the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique identifier for this run.
    pub run_id: uuid::Uuid,
    /// Start time (milliseconds since epoch).
    pub started_at_ms: u64,
    /// Completion time (milliseconds since epoch).
    pub completed_at_ms: u64,
    /// Labels that completed successfully.
    pub succeeded: Vec<String>,
    /// Labels that failed terminally.
    pub failed: Vec<String>,
    /// Number of retry attempts scheduled during the run.
    pub retries: u32,
    /// Bytes reported by successful downloads.
    pub downloaded_bytes: u64,
}

impl RunSummary {
    /// Total executions observed (successes + terminal failures + retries).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn total_attempts(&self) -> u32 {
        self.succeeded.len() as u32 + self.failed.len() as u32 + self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_label_extraction() {
        assert_eq!(DownloadEvent::started("a", 0).label(), Some("a"));
        assert_eq!(
            DownloadEvent::DownloadFailed(DownloadResult::failed("b", "x")).label(),
            Some("b")
        );
        assert!(DownloadEvent::DownloadsCancelled { discarded: 2 }.label().is_none());
    }

    #[test]
    fn test_terminal_result_matches_label_only() {
        let event = DownloadEvent::DownloadCompleted(DownloadResult::succeeded("a", 1));
        assert!(event.terminal_result_for("a").is_some());
        assert!(event.terminal_result_for("b").is_none());
        assert!(DownloadEvent::started("a", 0).terminal_result_for("a").is_none());
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let json = serde_json::to_value(DownloadEvent::started("a", 2)).unwrap();
        assert_eq!(json["type"], "download_started");
        assert_eq!(json["retry_count"], 2);

        let json = serde_json::to_value(DownloadEvent::DownloadProgress(
            DownloadProgress::from_fraction("a", 0.25, 400),
        ))
        .unwrap();
        assert_eq!(json["type"], "download_progress");
        assert_eq!(json["downloaded_bytes"], 100);
    }

    #[test]
    fn test_run_summary_attempts() {
        let summary = RunSummary {
            run_id: uuid::Uuid::nil(),
            started_at_ms: 0,
            completed_at_ms: 5,
            succeeded: vec!["a".into(), "b".into()],
            failed: vec!["c".into()],
            retries: 3,
            downloaded_bytes: 10,
        };
        assert_eq!(summary.total_attempts(), 6);
    }
}
