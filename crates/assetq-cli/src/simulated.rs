//! Simulated asset backend.
//!
//! Stands in for a real content server so the CLI can exercise the scheduler
//! and cache end to end. Behavior is driven by label prefixes:
//!
//! - `local/...` is already on disk (download size 0)
//! - `flaky/...` fails its first fetch, then succeeds
//! - `broken/...` fails every fetch
//! - `missing/...` does not exist: size queries and loads fail
//!
//! Everything else downloads successfully at the configured bandwidth.
//! Downloaded labels become local, so a second download is a no-op until
//! `clear_cache_storage` is called.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use assetq_core::{
    AssetBackendPort, BackendError, FetchHandle, FetchSnapshot, HandleId, InstanceHandle,
    InstanceId, ResourceHandle,
};

/// Size unit for simulated content.
const CHUNK: u64 = 256 * 1024;

/// Resources reported per label group.
const GROUP_SIZE: usize = 3;

/// Failure message for scripted fetch failures.
pub const SIMULATED_FAILURE: &str = "simulated network error";

#[derive(Default)]
struct SimState {
    local: HashSet<String>,
    attempts: HashMap<String, u32>,
    pending_catalogs: Vec<String>,
    next_id: u64,
    live_handles: usize,
    live_instances: usize,
}

impl SimState {
    const fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process content server with deterministic sizes and failures.
#[derive(Clone)]
pub struct SimulatedBackend {
    bandwidth: u64,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    /// Backend that transfers `bandwidth` bytes per second.
    pub fn new(bandwidth: u64) -> Self {
        let state = SimState {
            pending_catalogs: vec!["content_catalog".to_string()],
            ..SimState::default()
        };
        Self {
            bandwidth: bandwidth.max(1),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Remote size of `label`, independent of what is local.
    pub fn remote_size(label: &str) -> u64 {
        let spread = label.bytes().map(u64::from).sum::<u64>() % 8;
        CHUNK * (spread + 1)
    }

    /// Handles loaded and not yet released.
    pub fn live_handles(&self) -> usize {
        self.lock().live_handles
    }

    /// Instances created and not yet released.
    pub fn live_instances(&self) -> usize {
        self.lock().live_instances
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transfer_time(&self, size: u64) -> Duration {
        let millis = size.saturating_mul(1_000) / self.bandwidth;
        Duration::from_millis(millis.max(1))
    }
}

struct SimulatedFetch {
    label: String,
    started: Instant,
    duration: Duration,
    fails: bool,
    state: Arc<Mutex<SimState>>,
}

impl FetchHandle for SimulatedFetch {
    fn snapshot(&self) -> FetchSnapshot {
        let fraction = (self.started.elapsed().as_secs_f32() / self.duration.as_secs_f32()).min(1.0);

        if self.fails && fraction >= 0.5 {
            return FetchSnapshot::failed(0.5, SIMULATED_FAILURE);
        }
        if fraction < 1.0 {
            return FetchSnapshot::in_progress(fraction);
        }

        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .local
            .insert(self.label.clone());
        FetchSnapshot::succeeded()
    }
}

#[async_trait]
impl AssetBackendPort for SimulatedBackend {
    async fn download_size(&self, label: &str) -> Result<u64, BackendError> {
        if label.starts_with("missing/") {
            return Err(BackendError::not_found(label));
        }
        if label.starts_with("local/") || self.lock().local.contains(label) {
            return Ok(0);
        }
        Ok(Self::remote_size(label))
    }

    async fn begin_fetch(&self, label: &str) -> Result<Box<dyn FetchHandle>, BackendError> {
        if label.starts_with("missing/") {
            return Err(BackendError::not_found(label));
        }

        let attempt = {
            let mut state = self.lock();
            let attempts = state.attempts.entry(label.to_string()).or_default();
            *attempts += 1;
            *attempts
        };
        let fails = label.starts_with("broken/") || (label.starts_with("flaky/") && attempt == 1);
        debug!(label = %label, attempt, fails, "Simulated fetch started");

        Ok(Box::new(SimulatedFetch {
            label: label.to_string(),
            started: Instant::now(),
            duration: self.transfer_time(Self::remote_size(label)),
            fails,
            state: Arc::clone(&self.state),
        }))
    }

    async fn load(&self, key: &str) -> Result<ResourceHandle, BackendError> {
        if key.starts_with("missing/") {
            return Err(BackendError::not_found(key));
        }
        let mut state = self.lock();
        state.live_handles += 1;
        Ok(ResourceHandle::new(HandleId(state.mint()), key))
    }

    async fn load_by_label(&self, label: &str) -> Result<Vec<ResourceHandle>, BackendError> {
        if label.starts_with("missing/") {
            return Err(BackendError::not_found(label));
        }
        let mut state = self.lock();
        state.live_handles += GROUP_SIZE;
        Ok((0..GROUP_SIZE)
            .map(|i| ResourceHandle::new(HandleId(state.mint()), format!("{label}/{i}")))
            .collect())
    }

    async fn instantiate(
        &self,
        key: &str,
        parent: Option<InstanceHandle>,
    ) -> Result<InstanceHandle, BackendError> {
        if key.starts_with("missing/") {
            return Err(BackendError::instantiate(key, "no such prefab"));
        }
        let mut state = self.lock();
        state.live_instances += 1;
        let instance = InstanceHandle::new(InstanceId(state.mint()), key);
        debug!(
            key = %key,
            instance = %instance.id,
            parent = ?parent.map(|p| p.id),
            "Simulated instance created"
        );
        Ok(instance)
    }

    fn release(&self, handle: &ResourceHandle) {
        let mut state = self.lock();
        state.live_handles = state.live_handles.saturating_sub(1);
        debug!(key = %handle.key, id = %handle.id, "Simulated handle released");
    }

    fn release_instance(&self, instance: &InstanceHandle) {
        let mut state = self.lock();
        state.live_instances = state.live_instances.saturating_sub(1);
        debug!(key = %instance.key, id = %instance.id, "Simulated instance released");
    }

    async fn check_catalog_updates(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.lock().pending_catalogs.clone())
    }

    async fn apply_catalog_updates(&self, catalogs: &[String]) -> Result<bool, BackendError> {
        let mut state = self.lock();
        state.pending_catalogs.retain(|c| !catalogs.contains(c));
        Ok(true)
    }

    async fn clear_cache_storage(&self) -> Result<(), BackendError> {
        self.lock().local.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u64 = u64::MAX / 2;

    async fn finish(fetch: &dyn FetchHandle) -> FetchSnapshot {
        loop {
            let snapshot = fetch.snapshot();
            if snapshot.is_done() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_prefix_rules_for_size() {
        let backend = SimulatedBackend::new(FAST);

        assert_eq!(backend.download_size("local/ui").await.unwrap(), 0);
        assert!(backend.download_size("level-1").await.unwrap() >= CHUNK);
        assert!(backend.download_size("missing/x").await.is_err());
    }

    #[tokio::test]
    async fn test_successful_fetch_makes_content_local() {
        let backend = SimulatedBackend::new(FAST);

        let fetch = backend.begin_fetch("level-1").await.unwrap();
        let snapshot = finish(fetch.as_ref()).await;

        assert_eq!(snapshot, FetchSnapshot::succeeded());
        assert_eq!(backend.download_size("level-1").await.unwrap(), 0);

        backend.clear_cache_storage().await.unwrap();
        assert!(backend.download_size("level-1").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_flaky_fails_once() {
        let backend = SimulatedBackend::new(FAST);

        let first = backend.begin_fetch("flaky/a").await.unwrap();
        assert_eq!(finish(first.as_ref()).await.error(), Some(SIMULATED_FAILURE));

        let second = backend.begin_fetch("flaky/a").await.unwrap();
        assert!(finish(second.as_ref()).await.error().is_none());
    }

    #[tokio::test]
    async fn test_handles_are_counted() {
        let backend = SimulatedBackend::new(FAST);

        let handle = backend.load("tex").await.unwrap();
        let group = backend.load_by_label("ui").await.unwrap();
        assert_eq!(group.len(), GROUP_SIZE);
        assert_eq!(backend.live_handles(), 1 + GROUP_SIZE);

        backend.release(&handle);
        for h in &group {
            backend.release(h);
        }
        assert_eq!(backend.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_catalog_updates_apply_once() {
        let backend = SimulatedBackend::new(FAST);

        let pending = backend.check_catalog_updates().await.unwrap();
        assert_eq!(pending, vec!["content_catalog"]);
        assert!(backend.apply_catalog_updates(&pending).await.unwrap());
        assert!(backend.check_catalog_updates().await.unwrap().is_empty());
    }
}
