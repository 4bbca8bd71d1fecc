//! Broadcast relay implementation of the playback sink.
//!
//! [`RelaySink`] re-broadcasts appended audio segments to any number of
//! subscribers over a `tokio::sync::broadcast` channel. It is the built-in
//! sink for headless hosts (forwarding synthesized audio to whatever actually
//! renders it) and the realistic platform stand-in used by the pipeline
//! tests: it enforces the live-buffer budget, tracks play/pause state, and
//! reports natural end once a bound buffer has been sealed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::{AudioProfile, PlaybackSink, SinkBuffer, SinkError};
use crate::state::StreamingConfig;

/// Lifecycle of the relay's bound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    /// No buffer bound.
    Detached,
    /// A buffer is bound and accepting segments.
    Open,
    /// The bound buffer was sealed; no more segments will arrive.
    Sealed,
}

/// The currently bound buffer's identity and output channel.
struct Binding {
    id: Uuid,
    tx: broadcast::Sender<Bytes>,
}

struct RelayInner {
    current: RwLock<Option<Binding>>,
    playing: AtomicBool,
    phase_tx: watch::Sender<RelayPhase>,
}

impl RelayInner {
    /// True if `id` is still the bound buffer.
    fn is_bound(&self, id: Uuid) -> bool {
        self.current.read().as_ref().is_some_and(|b| b.id == id)
    }

    fn set_phase(&self, phase: RelayPhase) {
        // send_replace never fails; receivers may or may not exist.
        self.phase_tx.send_replace(phase);
    }
}

/// Playback sink that relays appended segments to broadcast subscribers.
pub struct RelaySink {
    config: StreamingConfig,
    /// Count of buffers created and not yet closed, across all bindings.
    live_buffers: Arc<AtomicUsize>,
    inner: Arc<RelayInner>,
}

impl RelaySink {
    /// Creates a new relay sink with the given streaming configuration.
    pub fn new(config: StreamingConfig) -> Self {
        let (phase_tx, _) = watch::channel(RelayPhase::Detached);
        Self {
            config,
            live_buffers: Arc::new(AtomicUsize::new(0)),
            inner: Arc::new(RelayInner {
                current: RwLock::new(None),
                playing: AtomicBool::new(false),
                phase_tx,
            }),
        }
    }

    /// Subscribes to the bound buffer's output.
    ///
    /// Returns `None` when no buffer is bound. Each subscriber receives the
    /// segments appended after it subscribed, in append order.
    pub fn subscribe(&self) -> Option<BroadcastStream<Bytes>> {
        self.inner
            .current
            .read()
            .as_ref()
            .map(|b| BroadcastStream::new(b.tx.subscribe()))
    }

    /// Current relay phase (for diagnostics and tests).
    #[must_use]
    pub fn phase(&self) -> RelayPhase {
        *self.inner.phase_tx.borrow()
    }

    /// Number of live (created, not yet closed) buffers.
    #[must_use]
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.load(Ordering::SeqCst)
    }
}

impl Default for RelaySink {
    fn default() -> Self {
        Self::new(StreamingConfig::default())
    }
}

#[async_trait]
impl PlaybackSink for RelaySink {
    fn supports(&self, mime: &str) -> bool {
        [AudioProfile::Mp3, AudioProfile::Aac, AudioProfile::Wav]
            .iter()
            .any(|p| p.mime_type() == mime)
    }

    async fn open(&self, mime: &str) -> Result<Box<dyn SinkBuffer>, SinkError> {
        if !self.supports(mime) {
            return Err(SinkError::UnsupportedMime(mime.to_string()));
        }

        let live = self.live_buffers.load(Ordering::SeqCst);
        if live >= self.config.max_live_buffers {
            return Err(SinkError::Exhausted(live));
        }

        let id = Uuid::new_v4();
        let (tx, _) = broadcast::channel(self.config.channel_capacity);

        {
            let mut current = self.inner.current.write();
            *current = Some(Binding { id, tx: tx.clone() });
        }
        self.inner.playing.store(false, Ordering::SeqCst);
        self.inner.set_phase(RelayPhase::Open);
        self.live_buffers.fetch_add(1, Ordering::SeqCst);

        log::debug!(
            "[Relay] Buffer {} bound for {} ({} live)",
            id,
            mime,
            self.live_buffers.load(Ordering::SeqCst)
        );

        Ok(Box::new(RelayBuffer {
            id,
            tx,
            inner: Arc::clone(&self.inner),
            live: Arc::clone(&self.live_buffers),
            closed: false,
        }))
    }

    fn play(&self) -> Result<(), SinkError> {
        if self.inner.current.read().is_none() {
            return Err(SinkError::Detached);
        }
        self.inner.playing.store(true, Ordering::SeqCst);
        log::debug!("[Relay] Playback started");
        Ok(())
    }

    fn pause(&self) {
        self.inner.playing.store(false, Ordering::SeqCst);
    }

    fn detach(&self) {
        let had_binding = self.inner.current.write().take().is_some();
        self.inner.playing.store(false, Ordering::SeqCst);
        if had_binding {
            self.inner.set_phase(RelayPhase::Detached);
            log::debug!("[Relay] Buffer unbound");
        }
    }

    fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }

    async fn ended(&self) {
        let mut rx = self.inner.phase_tx.subscribe();
        // wait_for checks the current value first, so a seal that landed
        // before this call still resolves immediately.
        let _ = rx.wait_for(|phase| *phase == RelayPhase::Sealed).await;
    }
}

/// The buffer half handed to [`crate::stream::StreamBufferManager`].
struct RelayBuffer {
    id: Uuid,
    tx: broadcast::Sender<Bytes>,
    inner: Arc<RelayInner>,
    live: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl SinkBuffer for RelayBuffer {
    async fn append(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if self.closed || !self.inner.is_bound(self.id) {
            return Err(SinkError::Detached);
        }
        // No subscribers is fine - the segment is simply not observed.
        if let Err(e) = self.tx.send(chunk) {
            log::trace!("[Relay] No subscribers for buffer {}: {}", self.id, e);
        }
        Ok(())
    }

    async fn seal(&mut self) -> Result<(), SinkError> {
        if self.closed || !self.inner.is_bound(self.id) {
            return Err(SinkError::Detached);
        }
        self.inner.set_phase(RelayPhase::Sealed);
        log::debug!("[Relay] Buffer {} sealed", self.id);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.live.fetch_sub(1, Ordering::SeqCst);

        let mut current = self.inner.current.write();
        if current.as_ref().is_some_and(|b| b.id == self.id) {
            *current = None;
            drop(current);
            self.inner.playing.store(false, Ordering::SeqCst);
            self.inner.set_phase(RelayPhase::Detached);
        }
        log::debug!("[Relay] Buffer {} closed", self.id);
    }
}

impl Drop for RelayBuffer {
    fn drop(&mut self) {
        self.close();
    }
}
