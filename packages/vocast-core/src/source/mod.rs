//! Chunked speech source abstraction.
//!
//! The controller pulls synthesized audio chunk-by-chunk from a
//! [`SpeechSource`], authorizing each request with a credential read from a
//! [`CredentialProvider`] at invocation time. [`HttpSpeechSource`] is the
//! concrete implementation speaking the OpenAI-style `audio/speech`
//! protocol.

pub mod http;

pub use http::HttpSpeechSource;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::VocastResult;

/// Pull-based stream of audio chunks from a speech source.
pub type SourceChunks = Pin<Box<dyn Stream<Item = VocastResult<Bytes>> + Send>>;

/// A chunked text-to-speech source.
#[async_trait]
pub trait SpeechSource: Send + Sync {
    /// Requests synthesis of `text`, returning a pull-based chunk stream.
    ///
    /// The stream stops yielding once `cancel` fires. Upstream refusals
    /// (auth, quota, rate limit) surface as
    /// [`VocastError::SourceRequestFailed`](crate::error::VocastError) with
    /// the upstream message verbatim.
    async fn synthesize(
        &self,
        text: &str,
        credential: &str,
        cancel: CancellationToken,
    ) -> VocastResult<SourceChunks>;
}

/// Supplies the API credential used to authorize speech requests.
///
/// Read on every request; the pipeline never caches the value, so rotation
/// in the host takes effect on the next play.
pub trait CredentialProvider: Send + Sync {
    /// Returns the current API credential, if one is configured.
    fn api_key(&self) -> Option<String>;
}

/// Fixed credential, for headless hosts and tests.
pub struct StaticCredentials {
    api_key: String,
}

impl StaticCredentials {
    /// Creates a provider that always returns the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn api_key(&self) -> Option<String> {
        Some(self.api_key.clone())
    }
}
