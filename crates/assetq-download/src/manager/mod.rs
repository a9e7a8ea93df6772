//! Download service implementation.
//!
//! The service accepts labeled download requests, runs them through the
//! executor under the strategy's concurrency cap, retries failures, and
//! publishes lifecycle events and aggregate progress.
//!
//! # Architecture
//!
//! - **Service**: Cheap cloneable handle; validates requests and owns the queue
//! - **Run loop**: Spawned when the service leaves idle; fills a `JoinSet` of
//!   workers from the queue and exits when both are empty
//! - **Worker**: Executes one task and reports an outcome to the loop
//!
//! # Concurrency Model
//!
//! - Queue, run flag and generation live behind one `tokio::sync::Mutex`
//! - `Notify` wakes the loop when work is enqueued
//! - Each run carries a generation; `cancel_all` bumps it so a cancelled
//!   loop can never commit into a newer run

mod bus;
mod run_state;
mod worker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, broadcast, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use assetq_core::{
    AssetBackendPort, ContentDownloaderPort, DownloadError, DownloadEvent,
    DownloadEventEmitterPort, DownloadResult, DownloadSettings, DownloadTask,
    NoopDownloadEmitter, SettingsError, validate_settings,
};

use crate::executor::DownloadExecutor;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::queue::DownloadQueue;
use crate::strategy::{DefaultRetryStrategy, RetryStrategy};

use bus::EventBus;
use run_state::RunState;
use worker::{DownloadJob, JobOutcome, WorkerDeps};

/// Failure message for an execution whose worker panicked.
pub const WORKER_PANICKED: &str = "download worker panicked";

/// Identifies one scheduling epoch between cancellations.
///
/// Used to prevent a cancelled loop from committing results into the state
/// of a run started after the cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
struct RunGeneration(u64);

impl RunGeneration {
    const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// State shared between request handlers and the run loop.
struct SchedulerState {
    queue: DownloadQueue,
    /// Labels currently executing.
    active: HashSet<String>,
    /// Whether a run loop is alive for the current generation.
    running: bool,
    generation: RunGeneration,
    /// Cancels the current generation's loop and workers.
    cancel: CancellationToken,
    run: Option<RunState>,
}

/// Dependencies for creating a download service.
pub struct DownloadServiceDeps {
    /// The backend executing fetches.
    pub backend: Arc<dyn AssetBackendPort>,
    /// Adapter-facing event sink.
    pub event_emitter: Arc<dyn DownloadEventEmitterPort>,
    /// Retry and concurrency policy; derived from `settings` when `None`.
    pub strategy: Option<Arc<dyn RetryStrategy>>,
    /// Service configuration.
    pub settings: DownloadSettings,
}

impl DownloadServiceDeps {
    /// Deps with a no-op emitter and the default strategy.
    pub fn new(backend: Arc<dyn AssetBackendPort>, settings: DownloadSettings) -> Self {
        Self {
            backend,
            event_emitter: Arc::new(NoopDownloadEmitter::new()),
            strategy: None,
            settings,
        }
    }

    /// Use a specific event emitter.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn DownloadEventEmitterPort>) -> Self {
        self.event_emitter = emitter;
        self
    }

    /// Use a specific retry strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// Build a download service from its dependencies.
///
/// Fails if the settings do not validate.
pub fn build_download_service(deps: DownloadServiceDeps) -> Result<DownloadService, SettingsError> {
    validate_settings(&deps.settings)?;

    let strategy = deps
        .strategy
        .unwrap_or_else(|| Arc::new(DefaultRetryStrategy::new(&deps.settings)));
    let (downloading_tx, _rx) = watch::channel(false);

    let inner = ServiceInner {
        deps: WorkerDeps {
            executor: DownloadExecutor::new(deps.backend, deps.settings.poll_interval()),
            strategy,
            tracker: Arc::new(ProgressTracker::new()),
            events: EventBus::new(deps.settings.event_buffer, deps.event_emitter),
        },
        state: Mutex::new(SchedulerState {
            queue: DownloadQueue::new(),
            active: HashSet::new(),
            running: false,
            generation: RunGeneration::default(),
            cancel: CancellationToken::new(),
            run: None,
        }),
        queue_notify: Notify::new(),
        downloading_tx,
    };

    tracing::debug!(
        max_concurrent = inner.deps.strategy.max_concurrent_downloads(),
        auto_retry = deps.settings.auto_retry_on_fail,
        max_retry = deps.settings.max_retry_count,
        "Download service created"
    );

    Ok(DownloadService {
        inner: Arc::new(inner),
    })
}

/// Prioritized, concurrency-capped download scheduler.
///
/// Cloning yields another handle to the same service.
#[derive(Clone)]
pub struct DownloadService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    deps: WorkerDeps,
    state: Mutex<SchedulerState>,
    /// Notifier for waking the run loop when work is available.
    queue_notify: Notify,
    downloading_tx: watch::Sender<bool>,
}

impl DownloadService {
    /// Queue a download of `label`. Starts processing if the service is idle.
    ///
    /// Returns as soon as the task is queued. A request for a label that is
    /// already executing is queued again and runs after that execution.
    pub async fn download_content(&self, label: &str, priority: i32) -> Result<(), DownloadError> {
        let mut state = self.inner.state.lock().await;
        self.enqueue_locked(&mut state, label, priority)
    }

    /// Queue `label` and wait for its terminal result.
    ///
    /// The result is the one of the execution that serves this request, never
    /// of an execution of the same label that was already running. Cancelling
    /// `cancel` abandons the wait only; the download itself keeps going.
    /// `cancel_all` ends the wait with `Err(Cancelled)`.
    pub async fn download_async(
        &self,
        label: &str,
        priority: i32,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult, DownloadError> {
        // Subscribing under the scheduler lock orders this receiver against
        // `DownloadStarted`, which the run loop emits under the same lock.
        let mut rx = {
            let mut state = self.inner.state.lock().await;
            let rx = self.inner.deps.events.subscribe();
            self.enqueue_locked(&mut state, label, priority)?;
            rx
        };

        // Terminal events only count once an execution started after enqueue.
        let mut started = false;
        loop {
            let received = tokio::select! {
                biased;

                () = cancel.cancelled() => return Err(DownloadError::Cancelled),
                received = rx.recv() => received,
            };

            match received {
                Ok(DownloadEvent::DownloadStarted { label: ref l, .. }) if l == label => {
                    started = true;
                }
                Ok(DownloadEvent::DownloadsCancelled { .. }) => {
                    return Err(DownloadError::Cancelled);
                }
                Ok(event) => {
                    if let Some(result) = event.terminal_result_for(label).filter(|_| started) {
                        return Ok(result.clone());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(label = %label, skipped, "Download waiter lagged behind events");
                    match self.pending_state(label).await {
                        Some(Pending::Queued) => started = false,
                        Some(Pending::Active) => started = true,
                        None => {
                            return Err(DownloadError::other(format!(
                                "Lost track of '{label}' after skipping {skipped} events"
                            )));
                        }
                    }
                }
                Err(RecvError::Closed) => return Err(DownloadError::Closed),
            }
        }
    }

    /// Download `labels` one after another.
    ///
    /// Returns the labels that completed successfully. Terminal failures are
    /// skipped; cancellation or an error stops the sequence and returns what
    /// completed so far.
    pub async fn download_multiple_async<S: AsRef<str> + Sync>(
        &self,
        labels: &[S],
        priority: i32,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut completed = Vec::with_capacity(labels.len());

        for label in labels {
            let label = label.as_ref();
            match self.download_async(label, priority, cancel).await {
                Ok(result) if result.success => completed.push(result.label),
                Ok(result) => {
                    tracing::debug!(label = %label, error = %result.error_message(), "Skipping failed label");
                }
                Err(e) => {
                    tracing::info!(
                        label = %label,
                        error = %e,
                        completed = completed.len(),
                        "Stopping multi-label download"
                    );
                    break;
                }
            }
        }

        completed
    }

    /// Bytes still to be fetched for `label`. No scheduling side effects.
    pub async fn check_download_size_async(
        &self,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        if label.is_empty() {
            return Err(DownloadError::invalid_label(label));
        }
        self.inner.deps.executor.download_size(label, cancel).await
    }

    /// Cancel everything: queued tasks are discarded, in-flight executions
    /// are signalled, counters reset, and the service is idle on return.
    ///
    /// Does not wait for in-flight executions to unwind. Returns the number
    /// of discarded queued tasks.
    pub async fn cancel_all(&self) -> usize {
        let mut state = self.inner.state.lock().await;

        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.generation = state.generation.next();

        let discarded = state.queue.clear();
        let interrupted = state.active.len();
        state.active.clear();
        state.running = false;
        state.run = None;

        self.inner.deps.tracker.reset();
        self.inner.downloading_tx.send_replace(false);
        self.inner
            .deps
            .events
            .emit(DownloadEvent::DownloadsCancelled { discarded });

        tracing::info!(discarded, interrupted, "Cancelled all downloads");
        discarded
    }

    /// Subscribe to every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.inner.deps.events.subscribe()
    }

    /// Whether a run is in progress.
    pub fn is_downloading(&self) -> bool {
        *self.inner.downloading_tx.borrow()
    }

    /// Observe the downloading flag.
    pub fn watch_downloading(&self) -> watch::Receiver<bool> {
        self.inner.downloading_tx.subscribe()
    }

    /// Executions in flight.
    pub fn active_count(&self) -> usize {
        self.inner.deps.tracker.active_count()
    }

    /// Tasks waiting in the queue.
    pub fn queued_count(&self) -> usize {
        self.inner.deps.tracker.queued_count()
    }

    /// Aggregate completion fraction in `[0, 1]`.
    pub fn overall_fraction(&self) -> f32 {
        self.inner.deps.tracker.overall_fraction()
    }

    /// Current aggregate progress.
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.deps.tracker.snapshot()
    }

    /// Observe aggregate progress.
    pub fn watch_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.inner.deps.tracker.watch()
    }

    /// Waiting labels in dequeue order.
    pub async fn queued_labels(&self) -> Vec<String> {
        self.inner.state.lock().await.queue.labels()
    }

    /// Labels currently executing, sorted.
    pub async fn active_labels(&self) -> Vec<String> {
        let mut labels: Vec<_> = self.inner.state.lock().await.active.iter().cloned().collect();
        labels.sort();
        labels
    }

    async fn pending_state(&self, label: &str) -> Option<Pending> {
        let state = self.inner.state.lock().await;
        if state.queue.contains(label) {
            Some(Pending::Queued)
        } else if state.active.contains(label) {
            Some(Pending::Active)
        } else {
            None
        }
    }

    fn enqueue_locked(
        &self,
        state: &mut SchedulerState,
        label: &str,
        priority: i32,
    ) -> Result<(), DownloadError> {
        if label.is_empty() {
            tracing::warn!(priority, "Rejected download request with empty label");
            return Err(DownloadError::invalid_label(label));
        }

        let outcome = state.queue.enqueue(DownloadTask::new(label, priority));
        if outcome.is_new() {
            self.inner.deps.tracker.on_download_queued();
        }
        tracing::info!(
            label = %label,
            priority,
            outcome = ?outcome,
            executing = state.active.contains(label),
            "Download queued"
        );

        if state.running {
            self.inner.queue_notify.notify_one();
        } else {
            let run = RunState::new();
            tracing::info!(run_id = %run.run_id(), "Download run started");
            state.run = Some(run);
            state.running = true;
            self.inner.downloading_tx.send_replace(true);

            let inner = Arc::clone(&self.inner);
            let generation = state.generation;
            let cancel = state.cancel.clone();
            tokio::spawn(async move {
                inner.run_loop(generation, cancel).await;
            });
        }

        Ok(())
    }
}

/// Where a label currently sits in the scheduler.
enum Pending {
    Queued,
    Active,
}

impl ServiceInner {
    /// The run loop for one busy period of one generation.
    async fn run_loop(self: Arc<Self>, generation: RunGeneration, cancel: CancellationToken) {
        let mut workers: JoinSet<JobOutcome> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, DownloadTask> = HashMap::new();

        loop {
            if !self
                .fill_or_finish(generation, &cancel, &mut workers, &mut in_flight)
                .await
            {
                return;
            }

            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::debug!(in_flight = workers.len(), "Run loop cancelled");
                    // Dropping the set aborts workers that have not unwound yet.
                    return;
                }

                Some(joined) = workers.join_next_with_id() => {
                    self.handle_joined(joined, generation, &cancel, &mut in_flight).await;
                }

                () = self.queue_notify.notified() => {}
            }
        }
    }

    /// Start workers up to the cap. Returns `false` when the loop should exit.
    async fn fill_or_finish(
        &self,
        generation: RunGeneration,
        cancel: &CancellationToken,
        workers: &mut JoinSet<JobOutcome>,
        in_flight: &mut HashMap<tokio::task::Id, DownloadTask>,
    ) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation || cancel.is_cancelled() {
            return false;
        }

        let cap = self.deps.strategy.max_concurrent_downloads().max(1);
        let state = &mut *state;
        while workers.len() < cap {
            // A label runs at most once at a time; later requests wait their turn.
            let active = &state.active;
            let Some(task) = state
                .queue
                .try_dequeue_where(|task| !active.contains(task.label()))
            else {
                break;
            };

            let label = task.label().to_string();
            self.deps.tracker.on_download_started(&label);
            self.deps
                .events
                .emit(DownloadEvent::started(&label, task.retry_count()));
            tracing::info!(
                label = %label,
                priority = task.priority(),
                retry_count = task.retry_count(),
                "Download started"
            );

            let job = DownloadJob {
                task: task.clone(),
                cancel: cancel.child_token(),
            };
            let handle = workers.spawn(worker::run_job(job, self.deps.clone()));
            state.active.insert(label);
            in_flight.insert(handle.id(), task);
        }

        if !workers.is_empty() || !state.queue.is_empty() {
            return true;
        }

        state.running = false;
        let summary = state.run.take().unwrap_or_else(RunState::new).finish();
        self.downloading_tx.send_replace(false);

        tracing::info!(
            run_id = %summary.run_id,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            retries = summary.retries,
            downloaded_bytes = summary.downloaded_bytes,
            "Download run completed"
        );
        self.deps
            .events
            .emit(DownloadEvent::AllDownloadsCompleted { summary });
        false
    }

    /// Commit one finished worker into the scheduler state.
    async fn handle_joined(
        &self,
        joined: Result<(tokio::task::Id, JobOutcome), JoinError>,
        generation: RunGeneration,
        cancel: &CancellationToken,
        in_flight: &mut HashMap<tokio::task::Id, DownloadTask>,
    ) {
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let task = in_flight.remove(&id);

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!("Ignoring stale worker outcome (generation mismatch)");
            return;
        }
        if let Some(task) = &task {
            state.active.remove(task.label());
        }

        let outcome = match joined {
            Ok((_, outcome)) => outcome,
            Err(e) => self.worker_crashed(&e, task.as_ref()),
        };

        match outcome {
            JobOutcome::Succeeded(result) | JobOutcome::Failed(result) => {
                if let Some(run) = state.run.as_mut() {
                    run.record_result(&result);
                }
            }
            JobOutcome::Retry { failure, next } => {
                if cancel.is_cancelled() {
                    return;
                }
                tracing::debug!(
                    label = %failure.label,
                    retry_count = next.retry_count(),
                    "Re-enqueuing failed download"
                );
                if state.queue.enqueue(next).is_new() {
                    self.deps.tracker.on_download_queued();
                }
                if let Some(run) = state.run.as_mut() {
                    run.record_retry();
                }
            }
            JobOutcome::Cancelled => {}
        }
    }

    /// Turn a panicked or aborted worker into an outcome.
    ///
    /// A panic counts as a failed execution and goes through the same retry
    /// decision as any other failure.
    fn worker_crashed(&self, error: &JoinError, task: Option<&DownloadTask>) -> JobOutcome {
        if error.is_cancelled() {
            return JobOutcome::Cancelled;
        }
        let label = task.map_or_else(|| format!("task-{}", error.id()), |t| t.label().to_string());
        tracing::error!(label = %label, error = %error, "Download worker panicked");

        let result = DownloadResult::failed(&label, WORKER_PANICKED);
        self.deps.tracker.on_download_completed(&result);

        if let Some(task) = task.filter(|t| self.deps.strategy.should_retry(t, &result)) {
            return JobOutcome::Retry {
                failure: result,
                next: task.with_retry(),
            };
        }

        self.deps.tracker.on_download_abandoned(&label);
        self.deps
            .events
            .emit(DownloadEvent::DownloadFailed(result.clone()));
        JobOutcome::Failed(result)
    }
}

#[async_trait]
impl ContentDownloaderPort for DownloadService {
    async fn download_size(&self, label: &str) -> Result<u64, DownloadError> {
        self.check_download_size_async(label, &CancellationToken::new())
            .await
    }

    async fn download(&self, label: &str, priority: i32) -> Result<DownloadResult, DownloadError> {
        self.download_async(label, priority, &CancellationToken::new())
            .await
    }
}
