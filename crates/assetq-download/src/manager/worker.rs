//! Download worker pipeline.
//!
//! One worker runs one dequeued task: it feeds progress to the tracker, emits
//! the progress and terminal events, asks the strategy whether a failure
//! should be retried, and hands the outcome back to the run loop. It never
//! touches the queue. The loop marks the task started (tracker and
//! `DownloadStarted`) under the scheduler lock before spawning the worker,
//! and re-enqueues retries.
//!
//! # Design Principles
//!
//! - Worker receives a `DownloadJob` (value type) and `WorkerDeps` (cloned Arcs)
//! - Cancellation is observed through the job's token and is never reported
//!   as a failure
//! - Non-cancellation faults become failed results carrying the fault message

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use assetq_core::{DownloadError, DownloadEvent, DownloadProgress, DownloadResult, DownloadTask};

use super::bus::EventBus;
use crate::executor::DownloadExecutor;
use crate::progress::ProgressTracker;
use crate::strategy::RetryStrategy;

/// Dependencies for the download worker.
///
/// These are cloned Arc references, allowing the worker to operate
/// independently of the service's locks.
#[derive(Clone)]
pub struct WorkerDeps {
    pub executor: DownloadExecutor,
    pub strategy: Arc<dyn RetryStrategy>,
    pub tracker: Arc<ProgressTracker>,
    pub events: EventBus,
}

/// A task to be executed by the worker.
pub struct DownloadJob {
    pub task: DownloadTask,
    /// Child of the run's token.
    pub cancel: CancellationToken,
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Completed; `DownloadCompleted` was emitted.
    Succeeded(DownloadResult),
    /// Failed terminally; `DownloadFailed` was emitted.
    Failed(DownloadResult),
    /// Failed and should be re-enqueued as the contained task.
    Retry {
        failure: DownloadResult,
        next: DownloadTask,
    },
    /// Cancelled; nothing was emitted or counted.
    Cancelled,
}

/// Run a job to completion.
pub async fn run_job(job: DownloadJob, deps: WorkerDeps) -> JobOutcome {
    let DownloadJob { task, cancel } = job;
    let label = task.label().to_string();

    let on_progress = {
        let tracker = Arc::clone(&deps.tracker);
        let events = deps.events.clone();
        let cancel = cancel.clone();
        move |progress: DownloadProgress| {
            if cancel.is_cancelled() {
                return;
            }
            tracker.on_download_progress(&progress);
            events.emit(DownloadEvent::DownloadProgress(progress));
        }
    };

    let executed = deps.executor.execute(&task, &cancel, &on_progress).await;
    if cancel.is_cancelled() {
        tracing::debug!(label = %label, "Download cancelled");
        return JobOutcome::Cancelled;
    }

    let result = match executed {
        Ok(result) => result,
        Err(DownloadError::Cancelled) => return JobOutcome::Cancelled,
        Err(e) => {
            tracing::warn!(label = %label, error = %e, "Download raised an error");
            DownloadResult::failed(&label, e.failure_message())
        }
    };

    deps.tracker.on_download_completed(&result);

    if result.success {
        tracing::info!(label = %label, size = result.size, "Download completed");
        deps.events
            .emit(DownloadEvent::DownloadCompleted(result.clone()));
        return JobOutcome::Succeeded(result);
    }

    if deps.strategy.should_retry(&task, &result) {
        let delay = deps.strategy.retry_delay(&task);
        tracing::warn!(
            label = %label,
            retry_count = task.retry_count(),
            error = %result.error_message(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Download failed, retrying"
        );

        if !delay.is_zero() {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return JobOutcome::Cancelled,
                () = tokio::time::sleep(delay) => {}
            }
        }

        return JobOutcome::Retry {
            failure: result,
            next: task.with_retry(),
        };
    }

    tracing::warn!(
        label = %label,
        retry_count = task.retry_count(),
        error = %result.error_message(),
        "Download failed"
    );
    deps.tracker.on_download_abandoned(&label);
    deps.events.emit(DownloadEvent::DownloadFailed(result.clone()));
    JobOutcome::Failed(result)
}
