//! Playback sink abstraction.
//!
//! The platform's progressive playback stack (a playable output bound to an
//! append-only media buffer) is an event-driven external resource. This
//! module defines the trait seam over it: [`PlaybackSink`] models the
//! playable output, [`SinkBuffer`] the bound buffer whose appends are
//! acknowledged asynchronously. Concrete implementations adapt their
//! platform's callbacks into these awaits; [`RelaySink`] is the built-in
//! implementation that re-broadcasts appended audio to subscribers.

pub mod relay;

pub use relay::RelaySink;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported audio codec/container profiles for synthesized speech.
///
/// A controller uses exactly one profile per its lifetime; there is no
/// cross-format negotiation or fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioProfile {
    Mp3,
    Aac,
    Wav,
}

impl AudioProfile {
    /// Returns the profile as a short string identifier (e.g., "mp3").
    ///
    /// This is also the `response_format` value sent to the speech source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Wav => "wav",
        }
    }

    /// Returns the MIME type for this profile.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Aac => "audio/aac",
            Self::Wav => "audio/wav",
        }
    }
}

/// Errors raised by a playback sink implementation.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink cannot decode the requested MIME profile.
    #[error("Unsupported MIME type or codec: {0}")]
    UnsupportedMime(String),

    /// Too many buffers are already live on the sink backend.
    ///
    /// Platforms cap the number of simultaneously bound media buffers, so a
    /// leaked buffer per session exhausts the budget after a few replays.
    #[error("Live buffer budget exhausted ({0} already open)")]
    Exhausted(usize),

    /// The buffer was detached while the operation was in flight.
    #[error("Buffer detached")]
    Detached,
}

/// An append-only media buffer bound to a playback sink.
///
/// Appends are acknowledged asynchronously: `append` resolves once the sink
/// has consumed the bytes and is ready for the next segment. Callers must
/// never overlap appends on one buffer; the sink's decoder assumes
/// sequential, non-overlapping media segments.
/// [`StreamBufferManager`](crate::stream::StreamBufferManager) enforces this.
#[async_trait]
pub trait SinkBuffer: Send {
    /// Queues a media segment; resolves on the sink's acknowledgement.
    async fn append(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Marks that no more segments will arrive.
    async fn seal(&mut self) -> Result<(), SinkError>;

    /// Releases the buffer and its backing resource handle immediately.
    ///
    /// Must be safe to call in any state, including with an append in
    /// flight; implementations drop pending work rather than delivering it.
    fn close(&mut self);
}

/// A playable media sink that binds one append-only buffer at a time.
///
/// Implementations own the platform playback object and its resource handle
/// for their lifetime. Exclusive ownership of the bound buffer transfers at
/// session boundaries: the previous buffer is fully closed before a new one
/// is opened.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Whether the sink can decode the given MIME profile.
    fn supports(&self, mime: &str) -> bool;

    /// Binds a fresh append-only buffer for `mime`.
    ///
    /// Resolves once the buffer is ready for its first append (the sink's
    /// open-ready signal is awaited internally, never exposed).
    async fn open(&self, mime: &str) -> Result<Box<dyn SinkBuffer>, SinkError>;

    /// Starts physical playback of the bound buffer's output.
    fn play(&self) -> Result<(), SinkError>;

    /// Pauses playback without releasing the bound buffer.
    fn pause(&self);

    /// Detaches the sink from its bound buffer, revoking the resource handle.
    ///
    /// Idempotent; detaching an unbound sink is a no-op.
    fn detach(&self);

    /// Whether the sink is currently playing.
    fn is_playing(&self) -> bool;

    /// Resolves when playback of a sealed buffer reaches its natural end.
    async fn ended(&self);
}
