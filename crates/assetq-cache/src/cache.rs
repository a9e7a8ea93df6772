//! Reference-counted asset cache.
//!
//! Two maps live behind one mutex: reference-counted entries keyed by
//! [`CacheKey`], and instantiated objects keyed by their synthetic cache id.
//! The mutex is never held across a backend await. Backend handles are
//! released after the lock is dropped.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use assetq_core::{
    AssetBackendPort, BackendError, ContentDownloaderPort, InstanceHandle, ResourceHandle,
};

use crate::entry::{CacheEntry, CacheKey};
use crate::error::CacheError;

#[derive(Default)]
struct CacheMaps {
    entries: IndexMap<CacheKey, CacheEntry>,
    instances: IndexMap<String, InstanceHandle>,
}

/// Tracks which backend resources are in use and releases each exactly once
/// when its last holder lets go.
pub struct AssetCache {
    backend: Arc<dyn AssetBackendPort>,
    downloader: Option<Arc<dyn ContentDownloaderPort>>,
    download_priority: i32,
    maps: Mutex<CacheMaps>,
}

impl AssetCache {
    /// Cache without a download pre-check: misses go straight to the backend.
    pub fn new(backend: Arc<dyn AssetBackendPort>) -> Self {
        Self {
            backend,
            downloader: None,
            download_priority: 0,
            maps: Mutex::new(CacheMaps::default()),
        }
    }

    /// Download missing content through `downloader` before loading it.
    #[must_use]
    pub fn with_downloader(mut self, downloader: Arc<dyn ContentDownloaderPort>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Priority used for pre-load downloads.
    #[must_use]
    pub const fn with_download_priority(mut self, priority: i32) -> Self {
        self.download_priority = priority;
        self
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load `key`, or take another reference if it is already loaded.
    ///
    /// A hit never calls the backend. On a miss the content is downloaded
    /// first when the downloader reports outstanding bytes. A failed load
    /// leaves nothing in the cache.
    pub async fn load(&self, key: &str) -> Result<ResourceHandle, CacheError> {
        let handles = self.acquire(CacheKey::named(key)).await?;
        handles
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::load(key, "backend returned no handle").into())
    }

    /// Load `keys` in order.
    ///
    /// Stops at the first failure and gives back the references taken by
    /// the earlier loads in the same call before returning the error.
    pub async fn load_many<S: AsRef<str> + Sync>(
        &self,
        keys: &[S],
    ) -> Result<Vec<ResourceHandle>, CacheError> {
        let mut loaded = Vec::with_capacity(keys.len());

        for key in keys {
            let key = key.as_ref();
            match self.load(key).await {
                Ok(handle) => loaded.push(handle),
                Err(e) => {
                    warn!(
                        key = %key,
                        error = %e,
                        rolled_back = loaded.len(),
                        "Batch load failed, releasing earlier loads"
                    );
                    // Release by the requested key: backends may normalize handle keys.
                    for earlier in &keys[..loaded.len()] {
                        self.release(earlier.as_ref()).await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(loaded)
    }

    /// Load every resource under `label` as one unit.
    ///
    /// Stored under the label with the same reference counting as [`load`].
    ///
    /// [`load`]: Self::load
    pub async fn load_by_label(&self, label: &str) -> Result<Vec<ResourceHandle>, CacheError> {
        self.acquire(CacheKey::label(label)).await
    }

    /// Instantiate a new object from `key`.
    ///
    /// Every call creates a distinct instance. Instances are not reference
    /// counted; release them with [`release_instance`].
    ///
    /// [`release_instance`]: Self::release_instance
    pub async fn instantiate(
        &self,
        key: &str,
        parent: Option<InstanceHandle>,
    ) -> Result<InstanceHandle, CacheError> {
        if key.is_empty() {
            warn!("Rejected instantiate with empty key");
            return Err(CacheError::invalid_key(key));
        }

        self.ensure_downloaded(key).await?;

        let instance = self
            .backend
            .instantiate(key, parent)
            .await
            .inspect_err(|e| warn!(key = %key, error = %e, "Instantiate failed"))?;

        let cache_id = instance.cache_id();
        self.maps
            .lock()
            .await
            .instances
            .insert(cache_id.clone(), instance.clone());

        debug!(key = %key, cache_id = %cache_id, "Instance created");
        Ok(instance)
    }

    async fn acquire(&self, key: CacheKey) -> Result<Vec<ResourceHandle>, CacheError> {
        if key.as_str().is_empty() {
            warn!("Rejected cache load with empty key");
            return Err(CacheError::invalid_key(key.as_str()));
        }

        if let Some(entry) = self.maps.lock().await.entries.get_mut(&key) {
            entry.acquire();
            debug!(key = %key, ref_count = entry.ref_count, "Cache hit");
            return Ok(entry.handles.clone());
        }

        self.ensure_downloaded(key.as_str()).await?;

        let handles = match self.load_from_backend(&key).await {
            Ok(handles) => handles,
            Err(e) => {
                if let Some(partial) = e.partial_handle() {
                    self.backend.release(partial);
                }
                warn!(key = %key, error = %e, "Cache load failed");
                return Err(e.into());
            }
        };

        let mut maps = self.maps.lock().await;
        if let Some(entry) = maps.entries.get_mut(&key) {
            // Another load of the same key finished first.
            entry.acquire();
            let winner = entry.handles.clone();
            drop(maps);
            debug!(key = %key, "Concurrent load lost, releasing duplicate");
            self.release_handles(&handles);
            return Ok(winner);
        }
        maps.entries
            .insert(key.clone(), CacheEntry::new(handles.clone()));
        drop(maps);

        info!(key = %key, handles = handles.len(), "Loaded into cache");
        Ok(handles)
    }

    async fn load_from_backend(&self, key: &CacheKey) -> Result<Vec<ResourceHandle>, BackendError> {
        match key {
            CacheKey::Named(key) => self.backend.load(key).await.map(|handle| vec![handle]),
            CacheKey::Label(label) => self.backend.load_by_label(label).await,
        }
    }

    async fn ensure_downloaded(&self, label: &str) -> Result<(), CacheError> {
        let Some(downloader) = &self.downloader else {
            return Ok(());
        };

        let size = downloader
            .download_size(label)
            .await
            .map_err(|e| CacheError::from_download(label, &e))?;
        if size == 0 {
            return Ok(());
        }

        debug!(label = %label, size, "Content missing locally, downloading before load");
        let result = downloader
            .download(label, self.download_priority)
            .await
            .map_err(|e| CacheError::from_download(label, &e))?;

        if result.success {
            Ok(())
        } else {
            Err(CacheError::download(label, result.error_message()))
        }
    }

    // =========================================================================
    // Releasing
    // =========================================================================

    /// Drop one reference to `key`. The backend handle is released when the
    /// count reaches zero. Unknown keys are ignored.
    pub async fn release(&self, key: &str) {
        self.release_entry(&CacheKey::named(key)).await;
    }

    /// Drop one reference to the label group `label`.
    pub async fn release_label(&self, label: &str) {
        self.release_entry(&CacheKey::label(label)).await;
    }

    async fn release_entry(&self, key: &CacheKey) {
        let mut maps = self.maps.lock().await;
        let Some(entry) = maps.entries.get_mut(key) else {
            debug!(key = %key, "Release of unloaded key ignored");
            return;
        };
        if !entry.release() {
            debug!(key = %key, ref_count = entry.ref_count, "Cache reference released");
            return;
        }

        let removed = maps.entries.shift_remove(key);
        drop(maps);

        if let Some(entry) = removed {
            self.release_handles(&entry.handles);
            info!(key = %key, "Unloaded from cache");
        }
    }

    /// Release one instance by identity. Unknown instances are ignored.
    pub async fn release_instance(&self, instance: &InstanceHandle) {
        let removed = {
            let mut maps = self.maps.lock().await;
            maps.instances
                .values()
                .position(|held| held.id == instance.id)
                .and_then(|index| maps.instances.shift_remove_index(index))
        };

        match removed {
            Some((cache_id, held)) => {
                self.backend.release_instance(&held);
                debug!(cache_id = %cache_id, "Instance released");
            }
            None => debug!(instance = %instance.id, "Release of unknown instance ignored"),
        }
    }

    /// Release everything regardless of reference counts.
    pub async fn release_all(&self) {
        let CacheMaps { entries, instances } = std::mem::take(&mut *self.maps.lock().await);

        for entry in entries.values() {
            self.release_handles(&entry.handles);
        }
        for instance in instances.values() {
            self.backend.release_instance(instance);
        }

        info!(
            entries = entries.len(),
            instances = instances.len(),
            "Released all cached resources"
        );
    }

    fn release_handles(&self, handles: &[ResourceHandle]) {
        for handle in handles {
            self.backend.release(handle);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Outstanding references to `key`; 0 when not loaded.
    pub async fn ref_count(&self, key: &str) -> u32 {
        self.entry_ref_count(&CacheKey::named(key)).await
    }

    /// Outstanding references to the label group `label`.
    pub async fn label_ref_count(&self, label: &str) -> u32 {
        self.entry_ref_count(&CacheKey::label(label)).await
    }

    async fn entry_ref_count(&self, key: &CacheKey) -> u32 {
        self.maps
            .lock()
            .await
            .entries
            .get(key)
            .map_or(0, |entry| entry.ref_count)
    }

    pub async fn is_loaded(&self, key: &str) -> bool {
        self.maps
            .lock()
            .await
            .entries
            .contains_key(&CacheKey::named(key))
    }

    /// The loaded handle for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<ResourceHandle> {
        self.maps
            .lock()
            .await
            .entries
            .get(&CacheKey::named(key))
            .and_then(|entry| entry.handles.first().cloned())
    }

    /// The handles loaded under `label`, if any.
    pub async fn get_label(&self, label: &str) -> Option<Vec<ResourceHandle>> {
        self.maps
            .lock()
            .await
            .entries
            .get(&CacheKey::label(label))
            .map(|entry| entry.handles.clone())
    }

    pub async fn instance_count(&self) -> usize {
        self.maps.lock().await.instances.len()
    }

    /// Number of reference-counted entries, named and label groups together.
    pub async fn len(&self) -> usize {
        self.maps.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        let maps = self.maps.lock().await;
        maps.entries.is_empty() && maps.instances.is_empty()
    }

    /// Loaded keys in load order.
    pub async fn keys(&self) -> Vec<CacheKey> {
        self.maps.lock().await.entries.keys().cloned().collect()
    }
}
