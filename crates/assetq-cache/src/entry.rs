//! Cache map entries.

use std::fmt;

use assetq_core::ResourceHandle;

/// Key of a reference-counted cache entry.
///
/// Named resources and label groups live in the same map but never collide:
/// `Named("ui")` and `Label("ui")` are different entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single resource loaded by key.
    Named(String),
    /// Every resource under a label, loaded as one unit.
    Label(String),
}

impl CacheKey {
    pub fn named(key: impl Into<String>) -> Self {
        Self::Named(key.into())
    }

    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }

    /// The raw key or label string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(key) | Self::Label(key) => key,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(key) => write!(f, "{key}"),
            Self::Label(label) => write!(f, "label:{label}"),
        }
    }
}

/// Loaded handles plus the number of outstanding holders.
#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub handles: Vec<ResourceHandle>,
    pub ref_count: u32,
}

impl CacheEntry {
    pub const fn new(handles: Vec<ResourceHandle>) -> Self {
        Self {
            handles,
            ref_count: 1,
        }
    }

    pub const fn acquire(&mut self) {
        self.ref_count = self.ref_count.saturating_add(1);
    }

    /// Drop one reference. Returns `true` when none remain.
    pub const fn release(&mut self) -> bool {
        self.ref_count = self.ref_count.saturating_sub(1);
        self.ref_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetq_core::HandleId;

    #[test]
    fn test_named_and_label_keys_differ() {
        assert_ne!(CacheKey::named("ui"), CacheKey::label("ui"));
        assert_eq!(CacheKey::label("ui").as_str(), "ui");
        assert_eq!(CacheKey::label("ui").to_string(), "label:ui");
        assert_eq!(CacheKey::named("ui").to_string(), "ui");
    }

    #[test]
    fn test_ref_count_never_negative() {
        let mut entry = CacheEntry::new(vec![ResourceHandle::new(HandleId(1), "tex")]);
        entry.acquire();
        assert!(!entry.release());
        assert!(entry.release());
        assert!(entry.release());
        assert_eq!(entry.ref_count, 0);
    }
}
