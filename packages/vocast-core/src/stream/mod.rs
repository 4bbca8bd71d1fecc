//! Buffer session management over append-only media sinks.

pub mod buffer;

pub use buffer::{BufferHandle, BufferState, StreamBufferManager};

/// One unit of binary audio delivered by the speech source.
///
/// Chunks are opaque bytes in the session's fixed codec profile; the order
/// they arrive in is the order they must reach the sink.
pub type AudioChunk = bytes::Bytes;
