//! Scriptable in-memory asset backend for tests.
//!
//! `FakeBackend` mints handles from a counter, reports scripted download
//! sizes, and finishes fetches after a fixed number of polls. Every call is
//! recorded so tests can assert on backend traffic (loads, releases, peak
//! concurrent fetches).
//!
//! ```ignore
//! let backend = FakeBackend::new()
//!     .with_size("textures", 1_000)
//!     .with_fetch_failures("textures", 2);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{AssetBackendPort, BackendError, FetchHandle, FetchSnapshot};
use crate::resource::{HandleId, InstanceHandle, InstanceId, ResourceHandle};

/// Polls a fetch takes to finish unless scripted otherwise.
pub const DEFAULT_FETCH_STEPS: u32 = 4;

/// Message carried by scripted fetch failures.
pub const SCRIPTED_FAILURE: &str = "scripted fetch failure";

#[derive(Debug, Default)]
struct FakeState {
    sizes: HashMap<String, u64>,
    size_errors: HashSet<String>,
    fetch_steps: HashMap<String, u32>,
    /// Remaining scripted failures per label; `u32::MAX` means always.
    fetch_failures: HashMap<String, u32>,
    rejected_fetches: HashSet<String>,
    missing: HashSet<String>,
    load_failures: HashMap<String, bool>,
    instantiate_failures: HashSet<String>,
    label_keys: HashMap<String, Vec<String>>,
    catalog_updates: Vec<String>,
    catalog_error: Option<String>,
    apply_result: bool,
    next_id: u64,

    size_queries: HashMap<String, u32>,
    fetches: HashMap<String, u32>,
    loads: HashMap<String, u32>,
    label_loads: HashMap<String, u32>,
    released: Vec<ResourceHandle>,
    released_instances: Vec<InstanceHandle>,
    applied: Vec<Vec<String>>,
    clears: u32,
    active_fetches: usize,
    peak_fetches: usize,
}

impl FakeState {
    fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Scriptable in-memory [`AssetBackendPort`].
///
/// Cloning shares the underlying script and call log.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// A backend where every label is already local and every load succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                apply_result: true,
                ..FakeState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report `size` bytes outstanding for `label`.
    #[must_use]
    pub fn with_size(self, label: &str, size: u64) -> Self {
        self.lock().sizes.insert(label.to_string(), size);
        self
    }

    /// Make the size query for `label` fail.
    #[must_use]
    pub fn with_size_error(self, label: &str) -> Self {
        self.lock().size_errors.insert(label.to_string());
        self
    }

    /// Number of polls a fetch of `label` takes to finish.
    #[must_use]
    pub fn with_fetch_steps(self, label: &str, steps: u32) -> Self {
        self.lock().fetch_steps.insert(label.to_string(), steps.max(1));
        self
    }

    /// Fail the first `times` fetches of `label`, then succeed.
    #[must_use]
    pub fn with_fetch_failures(self, label: &str, times: u32) -> Self {
        self.lock().fetch_failures.insert(label.to_string(), times);
        self
    }

    /// Fail every fetch of `label`.
    #[must_use]
    pub fn with_always_failing(self, label: &str) -> Self {
        self.with_fetch_failures(label, u32::MAX)
    }

    /// Make `begin_fetch` itself return an error for `label`.
    #[must_use]
    pub fn with_rejected_fetch(self, label: &str) -> Self {
        self.lock().rejected_fetches.insert(label.to_string());
        self
    }

    /// Make loads of `key` fail with `NotFound`.
    #[must_use]
    pub fn with_missing(self, key: &str) -> Self {
        self.lock().missing.insert(key.to_string());
        self
    }

    /// Make loads of `key` fail, optionally after acquiring a handle.
    #[must_use]
    pub fn with_load_failure(self, key: &str, leaves_partial: bool) -> Self {
        self.lock().load_failures.insert(key.to_string(), leaves_partial);
        self
    }

    /// Make instantiation of `key` fail.
    #[must_use]
    pub fn with_instantiate_failure(self, key: &str) -> Self {
        self.lock().instantiate_failures.insert(key.to_string());
        self
    }

    /// Keys returned by `load_by_label(label)`.
    #[must_use]
    pub fn with_label_keys(self, label: &str, keys: &[&str]) -> Self {
        self.lock().label_keys.insert(
            label.to_string(),
            keys.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Catalogs reported as having updates.
    #[must_use]
    pub fn with_catalog_updates(self, catalogs: &[&str]) -> Self {
        self.lock().catalog_updates = catalogs.iter().map(ToString::to_string).collect();
        self
    }

    /// Make catalog operations fail with `message`.
    #[must_use]
    pub fn with_catalog_error(self, message: &str) -> Self {
        self.lock().catalog_error = Some(message.to_string());
        self
    }

    /// Result reported by `apply_catalog_updates`.
    #[must_use]
    pub fn with_apply_result(self, success: bool) -> Self {
        self.lock().apply_result = success;
        self
    }

    /// Number of size queries for `label`.
    #[must_use]
    pub fn size_query_count(&self, label: &str) -> u32 {
        self.lock().size_queries.get(label).copied().unwrap_or(0)
    }

    /// Number of fetches started for `label`.
    #[must_use]
    pub fn fetch_count(&self, label: &str) -> u32 {
        self.lock().fetches.get(label).copied().unwrap_or(0)
    }

    /// Total fetches started across all labels.
    #[must_use]
    pub fn total_fetches(&self) -> u32 {
        self.lock().fetches.values().sum()
    }

    /// Number of `load` calls for `key`.
    #[must_use]
    pub fn load_count(&self, key: &str) -> u32 {
        self.lock().loads.get(key).copied().unwrap_or(0)
    }

    /// Number of `load_by_label` calls for `label`.
    #[must_use]
    pub fn label_load_count(&self, label: &str) -> u32 {
        self.lock().label_loads.get(label).copied().unwrap_or(0)
    }

    /// Every handle released so far, in order.
    #[must_use]
    pub fn released(&self) -> Vec<ResourceHandle> {
        self.lock().released.clone()
    }

    /// Number of released handles whose key is `key`.
    #[must_use]
    pub fn release_count(&self, key: &str) -> usize {
        self.lock().released.iter().filter(|h| h.key == key).count()
    }

    /// Every instance released so far, in order.
    #[must_use]
    pub fn released_instances(&self) -> Vec<InstanceHandle> {
        self.lock().released_instances.clone()
    }

    /// Batches passed to `apply_catalog_updates`.
    #[must_use]
    pub fn applied_updates(&self) -> Vec<Vec<String>> {
        self.lock().applied.clone()
    }

    /// Number of `clear_cache_storage` calls.
    #[must_use]
    pub fn clear_count(&self) -> u32 {
        self.lock().clears
    }

    /// Fetches currently alive (started and not yet dropped).
    #[must_use]
    pub fn active_fetches(&self) -> usize {
        self.lock().active_fetches
    }

    /// Highest number of fetches alive at the same time.
    #[must_use]
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.lock().peak_fetches
    }
}

/// Fetch that completes after a fixed number of polls.
struct FakeFetch {
    state: Arc<Mutex<FakeState>>,
    steps: u32,
    polls: AtomicU32,
    fails: bool,
}

impl FetchHandle for FakeFetch {
    #[allow(clippy::cast_precision_loss)]
    fn snapshot(&self) -> FetchSnapshot {
        let polled = self.polls.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if polled < self.steps {
            return FetchSnapshot::in_progress(polled as f32 / self.steps as f32);
        }
        if self.fails {
            FetchSnapshot::failed(0.5, SCRIPTED_FAILURE)
        } else {
            FetchSnapshot::succeeded()
        }
    }
}

impl Drop for FakeFetch {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.active_fetches = state.active_fetches.saturating_sub(1);
    }
}

#[async_trait]
impl AssetBackendPort for FakeBackend {
    async fn download_size(&self, label: &str) -> Result<u64, BackendError> {
        let mut state = self.lock();
        *state.size_queries.entry(label.to_string()).or_default() += 1;
        if state.size_errors.contains(label) {
            return Err(BackendError::fetch(label, "size query failed"));
        }
        Ok(state.sizes.get(label).copied().unwrap_or(0))
    }

    async fn begin_fetch(&self, label: &str) -> Result<Box<dyn FetchHandle>, BackendError> {
        let mut state = self.lock();
        *state.fetches.entry(label.to_string()).or_default() += 1;
        if state.rejected_fetches.contains(label) {
            return Err(BackendError::fetch(label, "fetch rejected"));
        }

        let fails = match state.fetch_failures.get_mut(label) {
            Some(remaining) if *remaining == u32::MAX => true,
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        let steps = state
            .fetch_steps
            .get(label)
            .copied()
            .unwrap_or(DEFAULT_FETCH_STEPS);

        state.active_fetches += 1;
        state.peak_fetches = state.peak_fetches.max(state.active_fetches);

        Ok(Box::new(FakeFetch {
            state: Arc::clone(&self.state),
            steps,
            polls: AtomicU32::new(0),
            fails,
        }))
    }

    async fn load(&self, key: &str) -> Result<ResourceHandle, BackendError> {
        let mut state = self.lock();
        *state.loads.entry(key.to_string()).or_default() += 1;
        if state.missing.contains(key) {
            return Err(BackendError::not_found(key));
        }
        if let Some(&leaves_partial) = state.load_failures.get(key) {
            if leaves_partial {
                let partial = ResourceHandle::new(HandleId(state.mint()), key);
                return Err(BackendError::load_with_partial(key, "scripted load failure", partial));
            }
            return Err(BackendError::load(key, "scripted load failure"));
        }
        Ok(ResourceHandle::new(HandleId(state.mint()), key))
    }

    async fn load_by_label(&self, label: &str) -> Result<Vec<ResourceHandle>, BackendError> {
        let mut state = self.lock();
        *state.label_loads.entry(label.to_string()).or_default() += 1;
        if state.missing.contains(label) {
            return Err(BackendError::not_found(label));
        }
        let keys = state
            .label_keys
            .get(label)
            .cloned()
            .unwrap_or_else(|| vec![label.to_string()]);
        Ok(keys
            .into_iter()
            .map(|key| ResourceHandle::new(HandleId(state.mint()), key))
            .collect())
    }

    async fn instantiate(
        &self,
        key: &str,
        _parent: Option<InstanceHandle>,
    ) -> Result<InstanceHandle, BackendError> {
        let mut state = self.lock();
        if state.instantiate_failures.contains(key) || state.missing.contains(key) {
            return Err(BackendError::instantiate(key, "scripted instantiate failure"));
        }
        Ok(InstanceHandle::new(InstanceId(state.mint()), key))
    }

    fn release(&self, handle: &ResourceHandle) {
        self.lock().released.push(handle.clone());
    }

    fn release_instance(&self, instance: &InstanceHandle) {
        self.lock().released_instances.push(instance.clone());
    }

    async fn check_catalog_updates(&self) -> Result<Vec<String>, BackendError> {
        let state = self.lock();
        if let Some(message) = &state.catalog_error {
            return Err(BackendError::catalog(message.clone()));
        }
        Ok(state.catalog_updates.clone())
    }

    async fn apply_catalog_updates(&self, catalogs: &[String]) -> Result<bool, BackendError> {
        let mut state = self.lock();
        if let Some(message) = &state.catalog_error {
            return Err(BackendError::catalog(message.clone()));
        }
        state.applied.push(catalogs.to_vec());
        Ok(state.apply_result)
    }

    async fn clear_cache_storage(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        if let Some(message) = &state.catalog_error {
            return Err(BackendError::catalog(message.clone()));
        }
        state.clears += 1;
        Ok(())
    }
}
