//! Configuration types for the playback pipeline.
//!
//! [`Config`] groups the two concerns a host configures: how speech is
//! requested from the synthesis endpoint ([`SpeechConfig`]) and how the
//! sink side buffers and relays audio ([`StreamingConfig`]). All fields
//! have sensible defaults.

use serde::{Deserialize, Serialize};

use crate::media::AudioProfile;

/// Configuration for the outbound speech synthesis request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeechConfig {
    /// Speech synthesis endpoint URL.
    pub endpoint: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// Voice preset sent with each request.
    pub voice: String,

    /// Audio profile requested from the source and opened on the sink.
    #[serde(default = "default_profile")]
    pub profile: AudioProfile,

    /// Connection timeout for the synthesis request (seconds).
    ///
    /// Bounds connection establishment only. The streamed body is never
    /// time-bounded; a running stream ends only on exhaustion or
    /// caller-triggered cancellation.
    pub request_timeout_secs: u64,
}

fn default_profile() -> AudioProfile {
    AudioProfile::Mp3
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/speech".to_string(),
            model: "tts-1-hd".to_string(),
            voice: "alloy".to_string(),
            profile: AudioProfile::Mp3,
            request_timeout_secs: 30,
        }
    }
}

/// Configuration for sink-side buffering behavior.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamingConfig {
    /// Maximum number of live (bound, not yet closed) buffer sinks.
    ///
    /// Mirrors the platform cap on simultaneously bound media buffers; a
    /// session that leaks its buffer eats into this budget until closed.
    pub max_live_buffers: usize,

    /// Capacity of the broadcast channel relaying appended segments.
    pub channel_capacity: usize,
}

impl StreamingConfig {
    /// Creates a new `StreamingConfig` with validated values.
    ///
    /// # Errors
    ///
    /// Returns an error if any value would cause runtime issues.
    pub fn new(max_live_buffers: usize, channel_capacity: usize) -> Result<Self, String> {
        let config = Self {
            max_live_buffers,
            channel_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_live_buffers == 0 {
            return Err("max_live_buffers must be >= 1".to_string());
        }
        if self.channel_capacity == 0 {
            return Err(
                "channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        Ok(())
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_live_buffers: 4,
            channel_capacity: 64,
        }
    }
}

/// Configuration for the Vocast playback pipeline.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Speech synthesis request configuration.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Sink-side streaming configuration.
    #[serde(default)]
    pub streaming: StreamingConfig,
}
