//! Opaque handles to backend-managed resources.
//!
//! The backend mints these; the cache stores them and hands them back on
//! release. Nothing outside the backend interprets the numeric ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend identifier of a loaded resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub u64);

/// Runtime identity of an instantiated object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a loaded backend resource, used for later release.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Backend identifier.
    pub id: HandleId,
    /// The key the resource was loaded from.
    pub key: String,
}

impl ResourceHandle {
    /// Create a new handle.
    pub fn new(id: HandleId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
        }
    }
}

/// Reference to an object the backend instantiated from a key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceHandle {
    /// Runtime identity of the instance.
    pub id: InstanceId,
    /// The key the instance was created from.
    pub key: String,
}

impl InstanceHandle {
    /// Create a new instance handle.
    pub fn new(id: InstanceId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
        }
    }

    /// Synthetic cache identifier: base key plus instance identity.
    #[must_use]
    pub fn cache_id(&self) -> String {
        format!("{}_{}", self.key, self.id)
    }
}
