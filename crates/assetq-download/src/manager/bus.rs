//! Event fan-out.
//!
//! Every event goes to the service's own broadcast channel (for in-process
//! awaiters such as `download_async`) and to the injected emitter port (for
//! adapters). Neither path blocks.

use std::sync::Arc;

use tokio::sync::broadcast;

use assetq_core::{DownloadEvent, DownloadEventEmitterPort};

/// Cloneable handle to the service's event outputs.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DownloadEvent>,
    emitter: Arc<dyn DownloadEventEmitterPort>,
}

impl EventBus {
    /// Create a bus with room for `capacity` unread events per subscriber.
    pub fn new(capacity: usize, emitter: Arc<dyn DownloadEventEmitterPort>) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx, emitter }
    }

    /// Deliver an event to subscribers and the emitter.
    pub fn emit(&self, event: DownloadEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
        self.emitter.emit(event);
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }
}
