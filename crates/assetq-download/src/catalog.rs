//! Catalog maintenance.
//!
//! A thin layer over the backend's catalog operations. Catalogs describe
//! which remote content exists; they are refreshed independently of label
//! downloads.

use std::sync::Arc;

use thiserror::Error;

use assetq_core::{AssetBackendPort, BackendError};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to check for catalog updates: {0}")]
    Check(#[source] BackendError),

    #[error("Failed to apply catalog updates: {0}")]
    Apply(#[source] BackendError),

    #[error("Failed to clear cached content: {0}")]
    ClearStorage(#[source] BackendError),
}

/// Outcome of [`CatalogManager::check_and_apply`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogUpdate {
    /// Catalogs that had pending updates.
    pub catalogs: Vec<String>,
    /// Whether the backend reported the update as applied. `false` when
    /// nothing was pending.
    pub applied: bool,
}

/// Checks for and applies catalog updates.
#[derive(Clone)]
pub struct CatalogManager {
    backend: Arc<dyn AssetBackendPort>,
}

impl CatalogManager {
    pub fn new(backend: Arc<dyn AssetBackendPort>) -> Self {
        Self { backend }
    }

    /// Catalogs with remote updates available.
    pub async fn check_for_updates(&self) -> Result<Vec<String>, CatalogError> {
        let catalogs = self
            .backend
            .check_catalog_updates()
            .await
            .map_err(CatalogError::Check)?;
        tracing::debug!(pending = catalogs.len(), "Checked catalog updates");
        Ok(catalogs)
    }

    /// Apply updates for `catalogs`. Returns the backend's success flag.
    pub async fn apply_updates(&self, catalogs: &[String]) -> Result<bool, CatalogError> {
        let applied = self
            .backend
            .apply_catalog_updates(catalogs)
            .await
            .map_err(CatalogError::Apply)?;

        if applied {
            tracing::info!(count = catalogs.len(), "Catalog updates applied");
        } else {
            tracing::warn!(count = catalogs.len(), "Backend rejected catalog updates");
        }
        Ok(applied)
    }

    /// Check, then apply whatever is pending. Does not call the backend's
    /// apply when nothing is pending.
    pub async fn check_and_apply(&self) -> Result<CatalogUpdate, CatalogError> {
        let catalogs = self.check_for_updates().await?;
        if catalogs.is_empty() {
            return Ok(CatalogUpdate::default());
        }

        let applied = self.apply_updates(&catalogs).await?;
        Ok(CatalogUpdate { catalogs, applied })
    }

    /// Drop all locally cached remote content.
    pub async fn clear_cache_storage(&self) -> Result<(), CatalogError> {
        self.backend
            .clear_cache_storage()
            .await
            .map_err(CatalogError::ClearStorage)?;
        tracing::info!("Cleared cached remote content");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetq_core::testing::FakeBackend;

    #[tokio::test]
    async fn test_check_and_apply_pending() {
        let backend = FakeBackend::new().with_catalog_updates(&["main", "dlc"]);
        let manager = CatalogManager::new(Arc::new(backend.clone()));

        let update = manager.check_and_apply().await.unwrap();
        assert_eq!(update.catalogs, vec!["main", "dlc"]);
        assert!(update.applied);
        assert_eq!(backend.applied_updates(), vec![vec!["main".to_string(), "dlc".to_string()]]);
    }

    #[tokio::test]
    async fn test_check_and_apply_nothing_pending() {
        let backend = FakeBackend::new();
        let manager = CatalogManager::new(Arc::new(backend.clone()));

        let update = manager.check_and_apply().await.unwrap();
        assert_eq!(update, CatalogUpdate::default());
        assert!(backend.applied_updates().is_empty());
    }

    #[tokio::test]
    async fn test_apply_reports_backend_flag() {
        let backend = FakeBackend::new().with_apply_result(false);
        let manager = CatalogManager::new(Arc::new(backend));

        assert!(!manager.apply_updates(&["main".to_string()]).await.unwrap());
    }

    #[tokio::test]
    async fn test_errors_are_wrapped() {
        let backend = FakeBackend::new().with_catalog_error("offline");
        let manager = CatalogManager::new(Arc::new(backend));

        assert!(matches!(
            manager.check_for_updates().await,
            Err(CatalogError::Check(_))
        ));
        assert!(matches!(
            manager.clear_cache_storage().await,
            Err(CatalogError::ClearStorage(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_cache_storage() {
        let backend = FakeBackend::new();
        let manager = CatalogManager::new(Arc::new(backend.clone()));

        manager.clear_cache_storage().await.unwrap();
        assert_eq!(backend.clear_count(), 1);
    }
}
