//! Vocast Core - incremental text-to-speech playback for chat clients.
//!
//! This crate converts a streamed, chunked audio response into gapless
//! playback through an append-only buffer abstraction, with support for
//! cancellation, restart, and teardown mid-stream. It is designed to be
//! embedded by UI shells (desktop or web runtime hosts) as well as headless
//! servers.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`runtime`]: Task spawning abstraction for async runtime independence
//! - [`events`]: Event system for real-time client communication
//! - [`state`]: Configuration types
//! - [`media`]: Playback sink abstraction and the broadcast relay sink
//! - [`stream`]: Sequential buffer session management
//! - [`source`]: Chunked speech source and credential traits
//! - [`services`]: The playback controller orchestrating one session at a time
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple the pipeline from
//! platform-specific implementations:
//!
//! - [`PlaybackSink`](media::PlaybackSink): The platform's append-only media
//!   buffer and playback surface
//! - [`SpeechSource`](source::SpeechSource): The chunked synthesis backend
//! - [`CredentialProvider`](source::CredentialProvider): API credential
//!   lookup at invocation time
//! - [`EventEmitter`](events::EventEmitter): Emitting playback events
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks
//!
//! Each trait has a default implementation suitable for headless use; UI
//! shells provide platform-specific ones.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod events;
pub mod media;
pub mod runtime;
pub mod services;
pub mod source;
pub mod state;
pub mod stream;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{VocastError, VocastResult};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, EventEmitter, LoggingEventEmitter, NoopEventEmitter,
    PlaybackEvent,
};
pub use media::{AudioProfile, PlaybackSink, RelaySink, SinkBuffer, SinkError};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use services::{PlaybackPhase, SpeechPlaybackController};
pub use source::{CredentialProvider, HttpSpeechSource, SpeechSource, StaticCredentials};
pub use state::{Config, SpeechConfig, StreamingConfig};
pub use stream::{AudioChunk, BufferHandle, BufferState, StreamBufferManager};
pub use utils::now_millis;
