//! The download request value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A requested download of one label.
///
/// Tasks are immutable: retrying produces a new task via [`Self::with_retry`].
/// For scheduling purposes the label is the task's identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadTask {
    label: String,
    priority: i32,
    retry_count: u32,
}

impl DownloadTask {
    /// Create a fresh task (retry count 0).
    pub fn new(label: impl Into<String>, priority: i32) -> Self {
        Self {
            label: label.into(),
            priority,
            retry_count: 0,
        }
    }

    /// The label this task downloads.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Scheduling priority. Higher values are dequeued first.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// How many times this task has already been retried.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// A copy of this task with the retry count incremented.
    #[must_use]
    pub fn with_retry(&self) -> Self {
        Self {
            label: self.label.clone(),
            priority: self.priority,
            retry_count: self.retry_count.saturating_add(1),
        }
    }

    /// A copy of this task carrying a different priority.
    #[must_use]
    pub fn with_priority(&self, priority: i32) -> Self {
        Self {
            label: self.label.clone(),
            priority,
            retry_count: self.retry_count,
        }
    }
}

impl fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (priority {}, retry {})",
            self.label, self.priority, self.retry_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_has_no_retries() {
        let task = DownloadTask::new("textures", 4);
        assert_eq!(task.label(), "textures");
        assert_eq!(task.priority(), 4);
        assert_eq!(task.retry_count(), 0);
    }

    #[test]
    fn test_with_retry_keeps_label_and_priority() {
        let task = DownloadTask::new("textures", 4);
        let retried = task.with_retry().with_retry();

        assert_eq!(retried.label(), "textures");
        assert_eq!(retried.priority(), 4);
        assert_eq!(retried.retry_count(), 2);
        // Original is untouched
        assert_eq!(task.retry_count(), 0);
    }

    #[test]
    fn test_display() {
        let task = DownloadTask::new("audio", -1).with_retry();
        assert_eq!(task.to_string(), "audio (priority -1, retry 1)");
    }
}
