//! Sequential buffer session manager.
//!
//! [`StreamBufferManager`] mediates between the event-driven platform buffer
//! ([`PlaybackSink`]/[`SinkBuffer`]) and the pull-based chunk pump: callers
//! see plain awaits while the manager tracks the buffer lifecycle, enforces
//! the single-outstanding-append rule, and discards acknowledgements that
//! land after the buffer was closed or superseded.
//!
//! The manager binds at most one buffer at a time. Opening while a previous
//! session's buffer is still attached releases it first - the platform only
//! returns a buffer to its live budget on close.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::AudioChunk;
use crate::error::{VocastError, VocastResult};
use crate::media::{PlaybackSink, SinkBuffer};

/// Handle identifying one buffer session.
///
/// Operations against a handle whose session has been closed or superseded
/// resolve as aborted without touching the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle(Uuid);

/// Lifecycle of a managed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// No buffer, or the handle's session is gone.
    Closed,
    /// The sink is binding the buffer; not yet ready for appends.
    Opening,
    /// Ready for sequential appends.
    Open,
    /// Seal requested; waiting for the pending append or the sink.
    Ending,
    /// Sealed; no more data will be accepted.
    Ended,
}

/// The currently bound buffer and its bookkeeping.
struct ActiveBuffer {
    id: Uuid,
    state: BufferState,
    /// Taken out while an operation is awaiting the sink.
    buffer: Option<Box<dyn SinkBuffer>>,
    /// An append is awaiting acknowledgement.
    appending: bool,
    /// Seal requested while an append was pending; delivered on its
    /// acknowledgement.
    seal_pending: bool,
}

/// Owns the append-only media buffer bound to a playback sink.
pub struct StreamBufferManager {
    sink: Arc<dyn PlaybackSink>,
    /// Never held across an await; in-flight operations take the boxed
    /// buffer out and re-check the entry when they come back.
    active: Mutex<Option<ActiveBuffer>>,
}

impl StreamBufferManager {
    /// Creates a manager over the given playback sink.
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self {
            sink,
            active: Mutex::new(None),
        }
    }

    /// Binds a fresh buffer for the given MIME profile.
    ///
    /// Resolves once the sink reports the buffer ready for appends. Any
    /// leftover buffer from an unclosed prior session is released first.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` if the sink cannot decode the profile;
    /// `StreamAborted` if the buffer was closed while the sink was opening.
    pub async fn open(&self, mime: &str) -> VocastResult<BufferHandle> {
        if !self.sink.supports(mime) {
            log::warn!("[Buffer] Unsupported MIME type or codec: {mime}");
            return Err(VocastError::UnsupportedFormat(mime.to_string()));
        }

        self.release_active("superseded by new open");

        let id = Uuid::new_v4();
        {
            let mut active = self.active.lock();
            *active = Some(ActiveBuffer {
                id,
                state: BufferState::Opening,
                buffer: None,
                appending: false,
                seal_pending: false,
            });
        }

        let opened = self.sink.open(mime).await;

        let mut active = self.active.lock();
        match opened {
            Ok(mut buffer) => match active.as_mut() {
                Some(entry) if entry.id == id => {
                    entry.buffer = Some(buffer);
                    entry.state = BufferState::Open;
                    log::debug!("[Buffer] {id} open for {mime}");
                    Ok(BufferHandle(id))
                }
                _ => {
                    // Closed while the sink was opening; the fresh buffer
                    // must not leak its resource handle.
                    buffer.close();
                    Err(VocastError::StreamAborted)
                }
            },
            Err(e) => {
                if active.as_ref().is_some_and(|entry| entry.id == id) {
                    *active = None;
                }
                Err(e.into())
            }
        }
    }

    /// Appends a chunk; resolves on the sink's acknowledgement.
    ///
    /// # Errors
    ///
    /// `BufferBusy` if a previous append on this handle is still pending
    /// (programming error); `StreamAborted` if the handle is stale or the
    /// buffer was closed while the append was in flight.
    pub async fn append(&self, handle: BufferHandle, chunk: AudioChunk) -> VocastResult<()> {
        let mut buffer = {
            let mut active = self.active.lock();
            let entry = match active.as_mut() {
                Some(entry) if entry.id == handle.0 => entry,
                // Stale handle: the chunk is dropped with no effect.
                _ => return Err(VocastError::StreamAborted),
            };
            if entry.appending {
                return Err(VocastError::BufferBusy);
            }
            match entry.state {
                BufferState::Open => {}
                BufferState::Ending | BufferState::Ended => {
                    return Err(VocastError::Internal("append after seal".to_string()));
                }
                BufferState::Opening | BufferState::Closed => {
                    return Err(VocastError::StreamAborted);
                }
            }
            let Some(buffer) = entry.buffer.take() else {
                return Err(VocastError::Internal("open buffer missing".to_string()));
            };
            entry.appending = true;
            buffer
        };

        let result = buffer.append(chunk).await;

        let seal_buffer = {
            let mut active = self.active.lock();
            let entry = match active.as_mut() {
                Some(entry) if entry.id == handle.0 => entry,
                _ => {
                    // Closed mid-append: the acknowledgement is discarded
                    // and the buffer released here, since close() could not
                    // reach it.
                    buffer.close();
                    return Err(VocastError::StreamAborted);
                }
            };
            entry.appending = false;
            entry.buffer = Some(buffer);

            if let Err(e) = result {
                return Err(e.into());
            }

            if entry.seal_pending {
                entry.seal_pending = false;
                entry.buffer.take()
            } else {
                None
            }
        };

        match seal_buffer {
            Some(buffer) => self.deliver_seal(handle, buffer).await,
            None => Ok(()),
        }
    }

    /// Marks that no more data will arrive.
    ///
    /// If an append is pending, the seal is delivered when it acknowledges
    /// (Ending, then Ended). Idempotent: sealing an already-sealed or closed
    /// handle is a no-op.
    pub async fn seal(&self, handle: BufferHandle) -> VocastResult<()> {
        let buffer = {
            let mut active = self.active.lock();
            let entry = match active.as_mut() {
                Some(entry) if entry.id == handle.0 => entry,
                _ => return Ok(()),
            };
            match entry.state {
                BufferState::Ended => return Ok(()),
                BufferState::Ending if !entry.seal_pending => return Ok(()),
                BufferState::Opening | BufferState::Closed => return Ok(()),
                _ => {}
            }
            if entry.appending {
                entry.seal_pending = true;
                entry.state = BufferState::Ending;
                return Ok(());
            }
            entry.seal_pending = false;
            entry.state = BufferState::Ending;
            match entry.buffer.take() {
                Some(buffer) => buffer,
                None => return Ok(()),
            }
        };

        self.deliver_seal(handle, buffer).await
    }

    /// Immediate teardown: releases the buffer and its resource handle and
    /// discards any pending acknowledgement. Safe from any state, including
    /// mid-append.
    pub fn close(&self, handle: BufferHandle) {
        let mut active = self.active.lock();
        match active.take() {
            Some(mut entry) if entry.id == handle.0 => {
                if let Some(mut buffer) = entry.buffer.take() {
                    buffer.close();
                }
                log::debug!("[Buffer] {} closed", entry.id);
            }
            other => *active = other,
        }
    }

    /// Current state for a handle. `Closed` for unknown or stale handles.
    #[must_use]
    pub fn state(&self, handle: BufferHandle) -> BufferState {
        let active = self.active.lock();
        match active.as_ref() {
            Some(entry) if entry.id == handle.0 => entry.state,
            _ => BufferState::Closed,
        }
    }

    /// Releases whatever buffer is currently bound, regardless of handle.
    fn release_active(&self, reason: &str) {
        let mut active = self.active.lock();
        if let Some(mut entry) = active.take() {
            log::debug!("[Buffer] Releasing buffer {} ({reason})", entry.id);
            if let Some(mut buffer) = entry.buffer.take() {
                buffer.close();
            }
            // If an operation holds the buffer it observes the removed
            // entry on return and releases it there.
        }
    }

    /// Forwards the seal to the sink and transitions Ending -> Ended.
    async fn deliver_seal(
        &self,
        handle: BufferHandle,
        mut buffer: Box<dyn SinkBuffer>,
    ) -> VocastResult<()> {
        let result = buffer.seal().await;

        let mut active = self.active.lock();
        match active.as_mut() {
            Some(entry) if entry.id == handle.0 => {
                entry.buffer = Some(buffer);
                match result {
                    Ok(()) => {
                        entry.state = BufferState::Ended;
                        log::debug!("[Buffer] {} sealed", handle.0);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            _ => {
                buffer.close();
                Err(VocastError::StreamAborted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{SinkBuffer, SinkError};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Sink fake that records operations and asserts appends never overlap.
    struct TestSink {
        ops: Arc<Mutex<Vec<String>>>,
        outstanding: Arc<AtomicBool>,
        /// When set, appends block until a permit is added.
        gate: Option<Arc<Semaphore>>,
        accept: bool,
    }

    impl TestSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                ops: Arc::new(Mutex::new(Vec::new())),
                outstanding: Arc::new(AtomicBool::new(false)),
                gate: None,
                accept: true,
            })
        }

        fn gated() -> (Arc<Self>, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let sink = Arc::new(Self {
                ops: Arc::new(Mutex::new(Vec::new())),
                outstanding: Arc::new(AtomicBool::new(false)),
                gate: Some(Arc::clone(&gate)),
                accept: true,
            });
            (sink, gate)
        }

        fn rejecting() -> Arc<Self> {
            Arc::new(Self {
                ops: Arc::new(Mutex::new(Vec::new())),
                outstanding: Arc::new(AtomicBool::new(false)),
                gate: None,
                accept: false,
            })
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().clone()
        }
    }

    #[async_trait]
    impl PlaybackSink for TestSink {
        fn supports(&self, _mime: &str) -> bool {
            self.accept
        }

        async fn open(&self, _mime: &str) -> Result<Box<dyn SinkBuffer>, SinkError> {
            self.ops.lock().push("open".to_string());
            Ok(Box::new(TestBuffer {
                ops: Arc::clone(&self.ops),
                outstanding: Arc::clone(&self.outstanding),
                gate: self.gate.clone(),
                closed: false,
            }))
        }

        fn play(&self) -> Result<(), SinkError> {
            Ok(())
        }

        fn pause(&self) {}

        fn detach(&self) {}

        fn is_playing(&self) -> bool {
            false
        }

        async fn ended(&self) {
            futures::future::pending::<()>().await;
        }
    }

    struct TestBuffer {
        ops: Arc<Mutex<Vec<String>>>,
        outstanding: Arc<AtomicBool>,
        gate: Option<Arc<Semaphore>>,
        closed: bool,
    }

    #[async_trait]
    impl SinkBuffer for TestBuffer {
        async fn append(&mut self, chunk: Bytes) -> Result<(), SinkError> {
            assert!(
                !self.outstanding.swap(true, Ordering::SeqCst),
                "overlapping append reached the sink"
            );
            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.expect("gate closed");
                permit.forget();
            }
            self.ops
                .lock()
                .push(format!("append:{}", String::from_utf8_lossy(&chunk)));
            self.outstanding.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn seal(&mut self) -> Result<(), SinkError> {
            self.ops.lock().push("seal".to_string());
            Ok(())
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.ops.lock().push("close".to_string());
            }
        }
    }

    impl Drop for TestBuffer {
        fn drop(&mut self) {
            self.close();
        }
    }

    fn manager(sink: &Arc<TestSink>) -> Arc<StreamBufferManager> {
        Arc::new(StreamBufferManager::new(
            Arc::clone(sink) as Arc<dyn PlaybackSink>
        ))
    }

    #[tokio::test]
    async fn open_rejects_unsupported_profile() {
        let sink = TestSink::rejecting();
        let mgr = manager(&sink);

        let err = mgr.open("audio/mpeg").await.err().expect("should fail");
        assert_eq!(err.code(), "unsupported_format");
        assert!(sink.ops().is_empty());
    }

    #[tokio::test]
    async fn append_and_seal_reach_the_sink_in_order() {
        let sink = TestSink::new();
        let mgr = manager(&sink);

        let handle = mgr.open("audio/mpeg").await.expect("open");
        assert_eq!(mgr.state(handle), BufferState::Open);

        mgr.append(handle, Bytes::from_static(b"A")).await.expect("a");
        mgr.append(handle, Bytes::from_static(b"B")).await.expect("b");
        mgr.seal(handle).await.expect("seal");

        assert_eq!(mgr.state(handle), BufferState::Ended);
        assert_eq!(sink.ops(), vec!["open", "append:A", "append:B", "seal"]);
    }

    #[tokio::test]
    async fn overlapping_append_is_rejected_as_busy() {
        let (sink, gate) = TestSink::gated();
        let mgr = manager(&sink);
        let handle = mgr.open("audio/mpeg").await.expect("open");

        let first = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.append(handle, Bytes::from_static(b"A")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = mgr
            .append(handle, Bytes::from_static(b"B"))
            .await
            .err()
            .expect("second append while first pending");
        assert_eq!(err.code(), "buffer_busy");

        gate.add_permits(1);
        first.await.expect("join").expect("first append");
        assert_eq!(sink.ops(), vec!["open", "append:A"]);
    }

    #[tokio::test]
    async fn close_mid_append_discards_the_acknowledgement() {
        let (sink, gate) = TestSink::gated();
        let mgr = manager(&sink);
        let handle = mgr.open("audio/mpeg").await.expect("open");

        let pending = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.append(handle, Bytes::from_static(b"A")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        mgr.close(handle);
        assert_eq!(mgr.state(handle), BufferState::Closed);

        gate.add_permits(1);
        let result = pending.await.expect("join");
        assert!(result.err().is_some_and(|e| e.is_abort()));

        // The buffer was released exactly once, on the append's return path.
        let closes = sink.ops().iter().filter(|op| *op == "close").count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn seal_is_idempotent() {
        let sink = TestSink::new();
        let mgr = manager(&sink);
        let handle = mgr.open("audio/mpeg").await.expect("open");

        mgr.seal(handle).await.expect("first seal");
        mgr.seal(handle).await.expect("second seal");
        mgr.close(handle);
        mgr.seal(handle).await.expect("seal after close");

        let seals = sink.ops().iter().filter(|op| *op == "seal").count();
        assert_eq!(seals, 1);
    }

    #[tokio::test]
    async fn seal_waits_for_the_pending_append() {
        let (sink, gate) = TestSink::gated();
        let mgr = manager(&sink);
        let handle = mgr.open("audio/mpeg").await.expect("open");

        let pending = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.append(handle, Bytes::from_static(b"A")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        mgr.seal(handle).await.expect("deferred seal");
        assert_eq!(mgr.state(handle), BufferState::Ending);
        assert!(!sink.ops().contains(&"seal".to_string()));

        gate.add_permits(1);
        pending.await.expect("join").expect("append");

        assert_eq!(mgr.state(handle), BufferState::Ended);
        assert_eq!(sink.ops(), vec!["open", "append:A", "seal"]);
    }

    #[tokio::test]
    async fn stale_handle_operations_have_no_effect() {
        let sink = TestSink::new();
        let mgr = manager(&sink);

        let stale = mgr.open("audio/mpeg").await.expect("open");
        mgr.close(stale);

        let err = mgr
            .append(stale, Bytes::from_static(b"A"))
            .await
            .err()
            .expect("stale append");
        assert!(err.is_abort());
        assert!(mgr.seal(stale).await.is_ok());

        assert_eq!(sink.ops(), vec!["open", "close"]);
    }

    #[tokio::test]
    async fn open_releases_a_leftover_buffer_first() {
        let sink = TestSink::new();
        let mgr = manager(&sink);

        let old = mgr.open("audio/mpeg").await.expect("first open");
        let new = mgr.open("audio/mpeg").await.expect("second open");

        assert_eq!(mgr.state(old), BufferState::Closed);
        assert_eq!(mgr.state(new), BufferState::Open);
        assert_eq!(sink.ops(), vec!["open", "close", "open"]);
    }
}
