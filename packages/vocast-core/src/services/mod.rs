//! High-level playback orchestration.

pub mod speech_controller;

pub use speech_controller::{PlaybackPhase, SpeechPlaybackController};
