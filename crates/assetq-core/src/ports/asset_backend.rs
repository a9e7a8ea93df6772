//! Asset backend port definition.
//!
//! The backend is the external collaborator that actually fetches, loads and
//! instantiates content. The scheduler and the cache only ever talk to it
//! through this trait.
//!
//! # Design
//!
//! - Fetches are pollable: `begin_fetch` returns a handle the executor samples
//!   on its own cadence
//! - Releases are synchronous and infallible from the caller's perspective
//! - A failed load may still have acquired a handle; it travels inside the
//!   error so the caller can release it

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::{InstanceHandle, ResourceHandle};

/// State of an in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchState {
    /// Still transferring.
    InProgress,
    /// Finished successfully.
    Succeeded,
    /// Finished with the backend's error message.
    Failed(String),
}

/// A single observation of a fetch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSnapshot {
    /// Completion fraction reported by the backend, nominally `[0, 1]`.
    pub percent_complete: f32,
    /// Current state.
    pub state: FetchState,
}

impl FetchSnapshot {
    /// An in-progress observation.
    #[must_use]
    pub const fn in_progress(percent_complete: f32) -> Self {
        Self {
            percent_complete,
            state: FetchState::InProgress,
        }
    }

    /// A successful, fully complete observation.
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            percent_complete: 1.0,
            state: FetchState::Succeeded,
        }
    }

    /// A failed observation.
    pub fn failed(percent_complete: f32, error: impl Into<String>) -> Self {
        Self {
            percent_complete,
            state: FetchState::Failed(error.into()),
        }
    }

    /// Whether the fetch has finished, successfully or not.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        !matches!(self.state, FetchState::InProgress)
    }

    /// The backend's error message for failed fetches.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            FetchState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Pollable handle to a fetch started by [`AssetBackendPort::begin_fetch`].
pub trait FetchHandle: Send + Sync {
    /// Observe the current state of the fetch.
    fn snapshot(&self) -> FetchSnapshot;

    /// Release backend resources held by the operation.
    ///
    /// Called once after the fetch finishes or is abandoned.
    fn release(&self) {}
}

/// Errors raised by the asset backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The key or label is unknown to the backend.
    #[error("Not found: {key}")]
    NotFound {
        /// The unknown key or label.
        key: String,
    },

    /// A fetch could not be started or queried.
    #[error("Fetch of '{label}' failed: {message}")]
    Fetch {
        /// The label being fetched.
        label: String,
        /// Detailed error message.
        message: String,
    },

    /// Loading a resource failed.
    #[error("Load of '{key}' failed: {message}")]
    Load {
        /// The key being loaded.
        key: String,
        /// Detailed error message.
        message: String,
        /// A handle the backend acquired before failing, to be released.
        partial: Option<ResourceHandle>,
    },

    /// Instantiating an object failed.
    #[error("Instantiate of '{key}' failed: {message}")]
    Instantiate {
        /// The key being instantiated.
        key: String,
        /// Detailed error message.
        message: String,
    },

    /// Catalog check/apply or cache-storage operation failed.
    #[error("Catalog error: {message}")]
    Catalog {
        /// Detailed error message.
        message: String,
    },

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl BackendError {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a fetch error.
    pub fn fetch(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            label: label.into(),
            message: message.into(),
        }
    }

    /// Create a load error with no partially acquired handle.
    pub fn load(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            key: key.into(),
            message: message.into(),
            partial: None,
        }
    }

    /// Create a load error carrying a handle that must be released.
    pub fn load_with_partial(
        key: impl Into<String>,
        message: impl Into<String>,
        partial: ResourceHandle,
    ) -> Self {
        Self::Load {
            key: key.into(),
            message: message.into(),
            partial: Some(partial),
        }
    }

    /// Create an instantiate error.
    pub fn instantiate(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Instantiate {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// The handle a failed load acquired, if any.
    #[must_use]
    pub const fn partial_handle(&self) -> Option<&ResourceHandle> {
        match self {
            Self::Load { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }
}

/// Port for the concrete asset backend.
///
/// Implementations own transport, storage and object creation. All async
/// methods are suspension points where cancellation may be observed by the
/// caller.
#[async_trait]
pub trait AssetBackendPort: Send + Sync {
    /// Bytes that still need to be fetched for `label` (0 = already local).
    async fn download_size(&self, label: &str) -> Result<u64, BackendError>;

    /// Start fetching every resource under `label`.
    async fn begin_fetch(&self, label: &str) -> Result<Box<dyn FetchHandle>, BackendError>;

    /// Load a single resource.
    async fn load(&self, key: &str) -> Result<ResourceHandle, BackendError>;

    /// Load every resource under `label` as one unit.
    async fn load_by_label(&self, label: &str) -> Result<Vec<ResourceHandle>, BackendError>;

    /// Instantiate an object from `key`, optionally under `parent`.
    async fn instantiate(
        &self,
        key: &str,
        parent: Option<InstanceHandle>,
    ) -> Result<InstanceHandle, BackendError>;

    /// Release a loaded resource.
    fn release(&self, handle: &ResourceHandle);

    /// Destroy an instantiated object.
    fn release_instance(&self, instance: &InstanceHandle);

    /// Catalogs that have remote updates available.
    async fn check_catalog_updates(&self) -> Result<Vec<String>, BackendError>;

    /// Apply catalog updates. Returns whether the backend reported success.
    async fn apply_catalog_updates(&self, catalogs: &[String]) -> Result<bool, BackendError>;

    /// Drop all locally cached remote content.
    async fn clear_cache_storage(&self) -> Result<(), BackendError>;
}
