//! Terminal results and in-flight progress samples.

use serde::{Deserialize, Serialize};

/// Outcome of one download execution.
///
/// `error` is `Some` exactly when `success` is false.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// The label that was downloaded.
    pub label: String,
    /// Whether the backend reported success.
    pub success: bool,
    /// Error message for failed downloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Downloaded size in bytes (0 for failures and already-local content).
    pub size: u64,
}

impl DownloadResult {
    /// A successful download of `size` bytes.
    pub fn succeeded(label: impl Into<String>, size: u64) -> Self {
        Self {
            label: label.into(),
            success: true,
            error: None,
            size,
        }
    }

    /// A failed download with the backend's (or the fault's) message.
    pub fn failed(label: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: false,
            error: Some(error.into()),
            size: 0,
        }
    }

    /// The error message, or an empty string for successes.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

/// A progress sample for one in-flight download.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// The label being downloaded.
    pub label: String,
    /// Fraction complete in `[0, 1]`.
    pub fraction: f32,
    /// Bytes downloaded so far.
    pub downloaded_bytes: u64,
    /// Total bytes for this label.
    pub total_bytes: u64,
}

impl DownloadProgress {
    /// Build a sample from the backend's completion fraction.
    ///
    /// The fraction is clamped to `[0, 1]` and the byte count is
    /// `floor(total * fraction)`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn from_fraction(label: impl Into<String>, fraction: f32, total_bytes: u64) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let downloaded_bytes = (total_bytes as f64 * f64::from(fraction)).floor() as u64;

        Self {
            label: label.into(),
            fraction,
            downloaded_bytes,
            total_bytes,
        }
    }

    /// Progress percentage (0.0 - 100.0).
    #[must_use]
    pub fn percentage(&self) -> f32 {
        self.fraction * 100.0
    }
}
