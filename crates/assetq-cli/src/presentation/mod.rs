//! Terminal output helpers.

mod progress;

pub use progress::{ProgressBoard, format_transfer};

use indicatif::HumanBytes;

use assetq_core::RunSummary;

/// Multi-line run summary.
pub fn format_summary(summary: &RunSummary) -> String {
    let elapsed_ms = summary.completed_at_ms.saturating_sub(summary.started_at_ms);
    let mut out = format!(
        "Run {} finished in {elapsed_ms} ms: {} succeeded, {} failed, {} retries, {} downloaded",
        summary.run_id,
        summary.succeeded.len(),
        summary.failed.len(),
        summary.retries,
        HumanBytes(summary.downloaded_bytes),
    );
    if !summary.failed.is_empty() {
        out.push_str("\n  Failed: ");
        out.push_str(&summary.failed.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(failed: &[&str]) -> RunSummary {
        RunSummary {
            run_id: Default::default(),
            started_at_ms: 1_000,
            completed_at_ms: 1_250,
            succeeded: vec!["a".to_string()],
            failed: failed.iter().map(ToString::to_string).collect(),
            retries: 2,
            downloaded_bytes: 2048,
        }
    }

    #[test]
    fn test_summary_lists_failures() {
        let text = format_summary(&summary(&["broken/x"]));
        assert!(text.contains("250 ms"));
        assert!(text.contains("1 succeeded, 1 failed, 2 retries, 2.00 KiB downloaded"));
        assert!(text.ends_with("Failed: broken/x"));
    }

    #[test]
    fn test_summary_without_failures_is_one_line() {
        assert_eq!(format_summary(&summary(&[])).lines().count(), 1);
    }
}
