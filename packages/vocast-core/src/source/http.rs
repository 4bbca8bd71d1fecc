//! HTTP speech source speaking the OpenAI-style `audio/speech` protocol.
//!
//! The request is a JSON POST with bearer authorization; the response body
//! is the chunked audio stream, consumed as opaque bytes. Refusals carry
//! the upstream body text so quota and auth messages reach the user intact.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{SourceChunks, SpeechSource};
use crate::error::{VocastError, VocastResult};
use crate::state::SpeechConfig;

/// Speech source backed by an OpenAI-compatible synthesis endpoint.
pub struct HttpSpeechSource {
    client: Client,
    config: SpeechConfig,
}

impl HttpSpeechSource {
    /// Creates a source with its own HTTP client.
    ///
    /// The configured timeout bounds connection establishment only; the
    /// streamed body is never time-bounded, since cancellation is
    /// caller-triggered.
    #[must_use]
    pub fn new(config: SpeechConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Creates a source sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, config: SpeechConfig) -> Self {
        Self { client, config }
    }

    /// Builds the synthesis request body for `text`.
    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "input": text,
            "voice": self.config.voice,
            "response_format": self.config.profile.as_str(),
            "stream": true,
        })
    }
}

#[async_trait]
impl SpeechSource for HttpSpeechSource {
    async fn synthesize(
        &self,
        text: &str,
        credential: &str,
        cancel: CancellationToken,
    ) -> VocastResult<SourceChunks> {
        log::info!(
            "[Speech] Requesting synthesis ({} chars, {}) from {}",
            text.len(),
            self.config.profile.as_str(),
            self.config.endpoint
        );

        let request = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(credential)
            .json(&self.request_body(text))
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VocastError::StreamAborted),
            result = request => result.map_err(|e| VocastError::SourceRequestFailed {
                status: None,
                message: e.to_string(),
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log::warn!("[Speech] Synthesis request refused ({status}): {message}");
            return Err(VocastError::SourceRequestFailed {
                status: Some(status.as_u16()),
                message,
            });
        }

        log::debug!("[Speech] Response streaming ({status})");

        let upstream = response.bytes_stream();
        let chunks = stream! {
            tokio::pin!(upstream);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = upstream.next() => match next {
                        Some(Ok(chunk)) => yield Ok(chunk),
                        Some(Err(e)) => {
                            yield Err(VocastError::SourceRequestFailed {
                                status: None,
                                message: e.to_string(),
                            });
                            break;
                        }
                        None => break,
                    },
                }
            }
        };

        Ok(Box::pin(chunks))
    }
}
