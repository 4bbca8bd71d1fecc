//! Event emitter abstraction for decoupling the pipeline from transport.
//!
//! The controller depends on the [`EventEmitter`] trait rather than concrete
//! broadcast channels, enabling testing and alternative transport
//! implementations.

use super::PlaybackEvent;

/// Trait for emitting playback events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyHost {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyHost {
///     fn on_session_done(&self, session_id: String) {
///         self.emitter.emit_playback(PlaybackEvent::Ended {
///             session_id,
///             timestamp: now_millis(),
///         });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a playback lifecycle event.
    fn emit_playback(&self, event: PlaybackEvent);
}

/// No-op emitter for hosts that only poll controller state.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_playback(&self, _event: PlaybackEvent) {
        // No-op: state is observable via the controller's queries
    }
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level. Useful for debugging event flow
/// or in development environments.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_playback(&self, event: PlaybackEvent) {
        tracing::debug!(?event, "playback_event");
    }
}
