//! Cache error types.

use thiserror::Error;

use assetq_core::{BackendError, DownloadError};

/// Errors from cache loads and instantiation.
///
/// A lookup of a key that is not loaded is not an error; the getters return
/// `None` instead.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key or label was empty.
    #[error("Invalid cache key: '{key}'")]
    InvalidKey { key: String },

    /// The pre-load download did not complete.
    #[error("Download of '{key}' failed: {message}")]
    Download { key: String, message: String },

    /// The backend rejected the load or instantiate call.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CacheError {
    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Create a download error.
    pub fn download(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wrap a scheduler error raised during the pre-load download.
    pub fn from_download(key: &str, error: &DownloadError) -> Self {
        Self::download(key, error.failure_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_pass_through() {
        let err: CacheError = BackendError::not_found("tex").into();
        assert!(matches!(err, CacheError::Backend(BackendError::NotFound { .. })));
        assert_eq!(err.to_string(), BackendError::not_found("tex").to_string());
    }

    #[test]
    fn test_download_error_message() {
        let err = CacheError::download("level-1", "timed out");
        assert_eq!(err.to_string(), "Download of 'level-1' failed: timed out");
    }
}
