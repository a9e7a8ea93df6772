//! Download handler.
//!
//! Queues every label, renders progress until each requested label reached a
//! terminal event, and prints the summary of every run that ended meanwhile.
//! Ctrl-C cancels all downloads.

use std::collections::HashSet;

use anyhow::{Result, bail};
use indicatif::HumanBytes;
use tokio::sync::broadcast::error::RecvError;

use assetq_core::DownloadEvent;

use crate::bootstrap::CliContext;
use crate::presentation::{ProgressBoard, format_summary};

/// Download command arguments passed from CLI.
pub struct DownloadArgs {
    pub labels: Vec<String>,
    pub priority: i32,
}

/// Execute the download command.
pub async fn execute(ctx: &CliContext, args: DownloadArgs) -> Result<()> {
    // Subscribe first so no event of this run is missed.
    let mut events = ctx.downloads.subscribe();
    for label in &args.labels {
        ctx.downloads.download_content(label, args.priority).await?;
    }

    // An early label can finish its run before a later one is queued, so
    // completion is tracked per label rather than per run.
    let mut pending: HashSet<&str> = args.labels.iter().map(String::as_str).collect();
    let mut failed: Vec<String> = Vec::new();

    let mut board = ProgressBoard::new();
    loop {
        let received = tokio::select! {
            biased;

            signal = tokio::signal::ctrl_c() => {
                signal?;
                board.clear();
                let discarded = ctx.downloads.cancel_all().await;
                println!("Cancelled; {discarded} queued downloads discarded");
                return Ok(());
            }
            received = events.recv() => received,
        };

        match received {
            Ok(DownloadEvent::DownloadStarted { label, retry_count }) => {
                board.start(&label, retry_count);
            }
            Ok(DownloadEvent::DownloadProgress(progress)) => {
                board.update(
                    &progress.label,
                    progress.downloaded_bytes,
                    progress.total_bytes,
                );
            }
            Ok(DownloadEvent::DownloadCompleted(result)) => {
                let line = if result.size == 0 {
                    format!("✓ {} (already local)", result.label)
                } else {
                    format!("✓ {} ({})", result.label, HumanBytes(result.size))
                };
                board.finish(&result.label, &line);
                pending.remove(result.label.as_str());
            }
            Ok(DownloadEvent::DownloadFailed(result)) => {
                let line = format!("✗ {}: {}", result.label, result.error_message());
                board.finish(&result.label, &line);
                if pending.remove(result.label.as_str()) {
                    failed.push(result.label);
                }
            }
            Ok(DownloadEvent::AllDownloadsCompleted { summary }) => {
                println!("{}", format_summary(&summary));
                if !pending.is_empty() {
                    tracing::debug!(remaining = pending.len(), "Run ended with labels still to go");
                    continue;
                }
                return conclude(&mut board, &failed);
            }
            Ok(DownloadEvent::DownloadsCancelled { .. }) => {
                board.clear();
                return Ok(());
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress display skipped events");
                // Terminal events may be among the skipped ones.
                let mut live = ctx.downloads.queued_labels().await;
                live.extend(ctx.downloads.active_labels().await);
                pending.retain(|label| live.iter().any(|l| l == label));
                if pending.is_empty() && !ctx.downloads.is_downloading() {
                    return conclude(&mut board, &failed);
                }
            }
            Err(RecvError::Closed) => bail!("Download service stopped unexpectedly"),
        }
    }
}

fn conclude(board: &mut ProgressBoard, failed: &[String]) -> Result<()> {
    board.clear();
    if !failed.is_empty() {
        bail!("{} download(s) failed", failed.len());
    }
    Ok(())
}
