//! Per-run bookkeeping (from idle→busy to busy→idle).

use indexmap::IndexMap;

use assetq_core::{DownloadResult, RunSummary};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::SystemTime;

    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(0)
}

/// State accumulated while the scheduler is busy.
#[derive(Debug)]
pub struct RunState {
    run_id: uuid::Uuid,
    started_at_ms: u64,
    /// Final outcome per label, in first-completion order.
    outcomes: IndexMap<String, bool>,
    retries: u32,
    downloaded_bytes: u64,
}

impl RunState {
    /// Start a new run.
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            started_at_ms: now_ms(),
            outcomes: IndexMap::new(),
            retries: 0,
            downloaded_bytes: 0,
        }
    }

    pub const fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Record a terminal result. A later result for the same label replaces
    /// the earlier one but keeps its position.
    pub fn record_result(&mut self, result: &DownloadResult) {
        if result.success {
            self.downloaded_bytes = self.downloaded_bytes.saturating_add(result.size);
        }
        self.outcomes.insert(result.label.clone(), result.success);
    }

    pub const fn record_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }

    /// Close the run.
    pub fn finish(self) -> RunSummary {
        let (succeeded, failed): (Vec<_>, Vec<_>) =
            self.outcomes.into_iter().partition(|(_, success)| *success);

        RunSummary {
            run_id: self.run_id,
            started_at_ms: self.started_at_ms,
            completed_at_ms: now_ms(),
            succeeded: succeeded.into_iter().map(|(label, _)| label).collect(),
            failed: failed.into_iter().map(|(label, _)| label).collect(),
            retries: self.retries,
            downloaded_bytes: self.downloaded_bytes,
        }
    }
}
