//! Download event emitter port.
//!
//! This port lets the scheduler forward events to adapters (UI bridges,
//! loggers, IPC) without coupling to their transport.

use crate::download::DownloadEvent;

/// Port for emitting download events.
///
/// Implementations handle the actual event delivery (channels, IPC, etc.).
pub trait DownloadEventEmitterPort: Send + Sync {
    /// Emit a download event.
    ///
    /// This method must not block; buffer or drop instead.
    fn emit(&self, event: DownloadEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort>;
}

/// A no-op download event emitter for tests and CLI contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopDownloadEmitter;

impl NoopDownloadEmitter {
    /// Create a new no-op download emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DownloadEventEmitterPort for NoopDownloadEmitter {
    fn emit(&self, _event: DownloadEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturingEmitter {
        captured: Arc<Mutex<Vec<DownloadEvent>>>,
    }

    impl DownloadEventEmitterPort for CapturingEmitter {
        fn emit(&self, event: DownloadEvent) {
            self.captured.lock().unwrap().push(event);
        }

        fn clone_box(&self) -> Box<dyn DownloadEventEmitterPort> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_noop_emitter() {
        let emitter: Arc<dyn DownloadEventEmitterPort> = Arc::new(NoopDownloadEmitter::new());
        emitter.emit(DownloadEvent::started("a", 0));
        let _boxed = emitter.clone_box();
    }

    #[test]
    fn test_boxed_clone_shares_sink() {
        let emitter = CapturingEmitter::default();
        let boxed = emitter.clone_box();

        boxed.emit(DownloadEvent::started("a", 0));
        emitter.emit(DownloadEvent::started("b", 0));

        let captured = emitter.captured.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].label(), Some("a"));
    }
}
