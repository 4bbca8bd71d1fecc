//! Event system for playback state reporting.
//!
//! This module provides:
//! - [`EventEmitter`] trait for the controller to emit lifecycle events
//! - [`BroadcastEventBridge`] for fan-out to UI transports
//! - The [`PlaybackEvent`] type describing session lifecycle changes

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events broadcast to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events related to speech playback sessions.
    Playback(PlaybackEvent),
}

/// Events related to speech playback session lifecycle.
///
/// The UI derives its "is this message playing" toggle state from these:
/// `Requested`/`Started` flip it on, the terminal events flip it off.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// A playback session was created and its synthesis request issued.
    Requested {
        /// The unique identifier for the session.
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Physical playback started (first chunk buffered and acknowledged).
    Started {
        /// The unique identifier for the session.
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Playback reached the natural end of the synthesized stream.
    Ended {
        /// The unique identifier for the session.
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The session was stopped before the stream ended (toggle-off or
    /// supersession by a newer request).
    Stopped {
        /// The unique identifier for the session.
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The session failed and was torn down.
    Failed {
        /// The unique identifier for the session.
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Machine-readable error code.
        code: String,
        /// Error message describing the failure.
        error: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<PlaybackEvent> for BroadcastEvent {
    fn from(event: PlaybackEvent) -> Self {
        BroadcastEvent::Playback(event)
    }
}
