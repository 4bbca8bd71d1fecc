//! Bridge implementation that maps playback events to broadcast transport.
//!
//! The [`BroadcastEventBridge`] lives at the boundary between the pipeline
//! and transport concerns, mapping typed playback events to a broadcast
//! channel that UI transports subscribe to.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BroadcastEvent, PlaybackEvent};

/// Bridges playback events to a broadcast channel.
///
/// This adapter implements [`EventEmitter`] by forwarding events to a
/// `tokio::sync::broadcast` channel that UI transports subscribe to.
///
/// For platform-specific emission (e.g., a desktop shell's frontend), the
/// bridge also forwards to an optional external emitter that can be set
/// after construction.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    /// Optional external emitter for platform-specific event delivery
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter for platform-specific event delivery.
    ///
    /// Can be called after construction, which is useful when the platform
    /// handle isn't available until later.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }
}

impl EventEmitter for BroadcastEventBridge {
    fn emit_playback(&self, event: PlaybackEvent) {
        if let Some(external) = self.external_emitter.read().as_ref() {
            external.emit_playback(event.clone());
        }
        // Send fails only when no receiver is subscribed, which is fine.
        let _ = self.tx.send(event.into());
    }
}
