//! Download error types.
//!
//! These errors are serializable and do not wrap non-serializable sources.
//! Backend failures are captured as their message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::BackendError;

/// Error type for download operations.
///
/// Terminal download failures are *not* errors: they are reported as
/// `DownloadEvent::DownloadFailed`. This type covers request validation,
/// faults raised while executing, and cancellation.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// The label was empty or otherwise unusable.
    #[error("Invalid label: {label:?}")]
    InvalidLabel {
        /// The rejected label.
        label: String,
    },

    /// The asset backend raised an error while querying or fetching.
    #[error("Backend error: {message}")]
    Backend {
        /// Detailed error message.
        message: String,
    },

    /// The operation was cancelled.
    #[error("Download cancelled")]
    Cancelled,

    /// The event stream closed before a terminal event was observed.
    #[error("Download service closed")]
    Closed,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl DownloadError {
    /// Create an invalid label error.
    pub fn invalid_label(label: impl Into<String>) -> Self {
        Self::InvalidLabel {
            label: label.into(),
        }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The message recorded on a failed `DownloadResult` for this fault.
    #[must_use]
    pub fn failure_message(&self) -> String {
        match self {
            Self::Backend { message } | Self::Other { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidLabel { .. } => "A download label must not be empty.".to_string(),
            Self::Backend { message } => format!("The asset backend failed: {message}"),
            Self::Cancelled => "Download was cancelled.".to_string(),
            Self::Closed => "The download service is no longer running.".to_string(),
            Self::Other { message } => message.clone(),
        }
    }
}

impl From<BackendError> for DownloadError {
    fn from(err: BackendError) -> Self {
        Self::backend(err.to_string())
    }
}

/// Convenience result type for download operations.
pub type DownloadOutcome<T> = Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_conversion() {
        let err: DownloadError = BackendError::fetch("ui", "503 from CDN").into();
        match err {
            DownloadError::Backend { message } => assert!(message.contains("503 from CDN")),
            other => panic!("Expected Backend variant, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_message_strips_prefix() {
        assert_eq!(DownloadError::backend("timeout").failure_message(), "timeout");
        assert_eq!(
            DownloadError::other("worker panicked").failure_message(),
            "worker panicked"
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = DownloadError::invalid_label("");
        let json = serde_json::to_string(&err).unwrap();
        let parsed: DownloadError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_is_cancelled() {
        assert!(DownloadError::Cancelled.is_cancelled());
        assert!(!DownloadError::Closed.is_cancelled());
    }
}
