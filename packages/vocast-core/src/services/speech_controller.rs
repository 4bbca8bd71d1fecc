//! Speech playback orchestration.
//!
//! Responsibilities:
//! - Own the single active playback session and its cancellation token
//! - Drive chunk consumption from the speech source into the buffer manager
//! - Start physical playback once the first chunk is buffered
//! - Translate the UI's toggle into explicit start/stop operations
//! - Guarantee no orphaned network reads or buffer sinks survive a session
//!
//! One session is live at a time. A new play request supersedes whatever is
//! running, including a session still waiting for its first chunk: the old
//! session is cancelled and fully torn down before the new buffer opens.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{VocastError, VocastResult};
use crate::events::{EventEmitter, PlaybackEvent};
use crate::media::PlaybackSink;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::source::{CredentialProvider, SourceChunks, SpeechSource};
use crate::state::SpeechConfig;
use crate::stream::{BufferHandle, StreamBufferManager};
use crate::utils::now_millis;

/// Phase of the playback state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No session active.
    Idle,
    /// Buffer opened and synthesis requested; no chunk has arrived yet.
    Requesting,
    /// Chunks are flowing into the buffer and playback has started.
    Streaming,
    /// Teardown in progress.
    Stopping,
}

/// One playback attempt, from buffer open to seal/close.
struct PlaybackSession {
    id: Uuid,
    /// Fired on toggle-off, supersession, or failure; every continuation
    /// checks it before applying a result.
    cancel: CancellationToken,
    /// Set once the buffer is open; absent while the sink is still binding.
    handle: Option<BufferHandle>,
    /// Physical playback started. Latches once, never clears.
    started: bool,
}

struct ControllerState {
    phase: PlaybackPhase,
    session: Option<PlaybackSession>,
}

/// Session-lifecycle dependencies shared with the spawned chunk pump.
///
/// Extracted so the pump can outlive the `start_speaking` call that spawned
/// it without holding the controller itself.
#[derive(Clone)]
struct ControllerDeps {
    buffers: Arc<StreamBufferManager>,
    sink: Arc<dyn PlaybackSink>,
    emitter: Arc<dyn EventEmitter>,
    state: Arc<Mutex<ControllerState>>,
}

/// Orchestrates one speech playback session at a time.
///
/// Constructed per playback surface (e.g. one per chat message list); all
/// state lives on the instance, so multiple controllers can coexist without
/// interfering.
pub struct SpeechPlaybackController {
    source: Arc<dyn SpeechSource>,
    credentials: Arc<dyn CredentialProvider>,
    spawner: TokioSpawner,
    config: SpeechConfig,
    deps: ControllerDeps,
}

impl SpeechPlaybackController {
    /// Creates a controller over the given collaborators.
    pub fn new(
        source: Arc<dyn SpeechSource>,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn PlaybackSink>,
        emitter: Arc<dyn EventEmitter>,
        spawner: TokioSpawner,
        config: SpeechConfig,
    ) -> Self {
        Self {
            source,
            credentials,
            spawner,
            config,
            deps: ControllerDeps {
                buffers: Arc::new(StreamBufferManager::new(Arc::clone(&sink))),
                sink,
                emitter,
                state: Arc::new(Mutex::new(ControllerState {
                    phase: PlaybackPhase::Idle,
                    session: None,
                })),
            },
        }
    }

    /// Toggle entry point for the UI: starts synthesis of `text` when idle,
    /// stops the running session otherwise.
    ///
    /// Returns whether audio is playing after the call.
    pub async fn toggle(&self, text: &str) -> VocastResult<bool> {
        if self.is_playing() {
            self.stop_speaking();
            Ok(false)
        } else {
            self.start_speaking(text).await?;
            Ok(true)
        }
    }

    /// Starts a new playback session for `text`.
    ///
    /// Any live session is superseded first - including one still in
    /// Requesting: cancel and restart, never queue.
    pub async fn start_speaking(&self, text: &str) -> VocastResult<()> {
        self.stop_speaking();

        let api_key = self.credentials.api_key().ok_or_else(|| {
            VocastError::Configuration("no API credential configured".to_string())
        })?;

        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        {
            let mut state = self.deps.state.lock();
            state.phase = PlaybackPhase::Requesting;
            state.session = Some(PlaybackSession {
                id: session_id,
                cancel: cancel.clone(),
                handle: None,
                started: false,
            });
        }

        log::info!(
            "[Playback] Session {session_id} requested ({} chars)",
            text.len()
        );
        self.deps.emitter.emit_playback(PlaybackEvent::Requested {
            session_id: session_id.to_string(),
            timestamp: now_millis(),
        });

        let mime = self.config.profile.mime_type();
        let handle = match self.deps.buffers.open(mime).await {
            Ok(handle) => handle,
            Err(e) => {
                self.deps.teardown_session(session_id, Some(&e));
                return Err(e);
            }
        };

        // The session may have been superseded while the sink was binding.
        {
            let mut state = self.deps.state.lock();
            let current = state
                .session
                .as_mut()
                .filter(|s| s.id == session_id && !s.cancel.is_cancelled());
            match current {
                Some(session) => session.handle = Some(handle),
                None => {
                    self.deps.buffers.close(handle);
                    return Err(VocastError::StreamAborted);
                }
            }
        }

        let chunks = match self.source.synthesize(text, &api_key, cancel.clone()).await {
            Ok(chunks) => chunks,
            Err(e) => {
                self.deps
                    .teardown_session(session_id, (!e.is_abort()).then_some(&e));
                return Err(e);
            }
        };

        let deps = self.deps.clone();
        self.spawner.spawn(async move {
            deps.run_pump(session_id, handle, cancel, chunks).await;
        });

        Ok(())
    }

    /// Stops any active session: cancels the source, closes the buffer, and
    /// pauses and detaches the sink.
    ///
    /// Never fails. Teardown must always return the controller to Idle, so
    /// cleanup problems are logged by the collaborators, not propagated.
    pub fn stop_speaking(&self) {
        let session_id = {
            let state = self.deps.state.lock();
            state.session.as_ref().map(|s| s.id)
        };
        if let Some(session_id) = session_id {
            log::info!("[Playback] Stopping session {session_id}");
            self.deps.teardown_session(session_id, None);
        }
    }

    /// Tears the controller down. Called when the owning surface goes away.
    pub fn shutdown(&self) {
        self.stop_speaking();
    }

    /// Current phase of the playback state machine.
    #[must_use]
    pub fn phase(&self) -> PlaybackPhase {
        self.deps.state.lock().phase
    }

    /// Whether a session is live (requested or streaming).
    ///
    /// This is the UI's toggle state: true from the play request until the
    /// session ends, fails, or is stopped.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(
            self.phase(),
            PlaybackPhase::Requesting | PlaybackPhase::Streaming
        )
    }

    /// The live playback sink, for embedding in playback UI controls.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn PlaybackSink> {
        Arc::clone(&self.deps.sink)
    }
}

impl ControllerDeps {
    /// Drives one session's chunks from the source into the buffer.
    async fn run_pump(
        self,
        session_id: Uuid,
        handle: BufferHandle,
        cancel: CancellationToken,
        mut chunks: SourceChunks,
    ) {
        match self
            .pump_chunks(session_id, handle, &cancel, &mut chunks)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_abort() => {
                // Toggle-off or supersession; the stopping path already tore
                // the session down.
                log::debug!("[Playback] Session {session_id} aborted mid-stream");
            }
            Err(e) => {
                log::warn!("[Playback] Session {session_id} failed: {e}");
                self.teardown_session(session_id, Some(&e));
            }
        }
    }

    /// The chunk pump: pull, append, acknowledge, repeat; seal on
    /// exhaustion and wait for the sink's natural end.
    async fn pump_chunks(
        &self,
        session_id: Uuid,
        handle: BufferHandle,
        cancel: &CancellationToken,
        chunks: &mut SourceChunks,
    ) -> VocastResult<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(VocastError::StreamAborted),
                next = chunks.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(e),
                None => break,
            };

            if !self.is_current(session_id) {
                return Err(VocastError::StreamAborted);
            }

            // The next chunk is not pulled until this append acknowledges -
            // the sink's decoder requires sequential, non-overlapping
            // segments.
            self.buffers.append(handle, chunk).await?;

            // An acknowledgement that lands after cancellation is stale.
            if cancel.is_cancelled() {
                return Err(VocastError::StreamAborted);
            }

            self.start_playback_once(session_id)?;
        }

        // Source exhausted: seal, then idle once the sink finishes playing.
        if !self.is_current(session_id) {
            return Err(VocastError::StreamAborted);
        }
        self.buffers.seal(handle).await?;
        log::debug!("[Playback] Session {session_id} sealed, awaiting natural end");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VocastError::StreamAborted),
            () = self.sink.ended() => {}
        }

        self.finish_session(session_id);
        Ok(())
    }

    /// Starts physical playback on the first acknowledged append; later
    /// calls are no-ops thanks to the session's started latch.
    fn start_playback_once(&self, session_id: Uuid) -> VocastResult<()> {
        let first = {
            let mut state = self.state.lock();
            let ControllerState { phase, session } = &mut *state;
            match session.as_mut() {
                Some(session) if session.id == session_id && !session.cancel.is_cancelled() => {
                    if session.started {
                        false
                    } else {
                        session.started = true;
                        *phase = PlaybackPhase::Streaming;
                        true
                    }
                }
                _ => return Err(VocastError::StreamAborted),
            }
        };

        if first {
            self.sink
                .play()
                .map_err(|e| VocastError::Internal(format!("failed to start playback: {e}")))?;
            log::info!("[Playback] Session {session_id} playing");
            self.emitter.emit_playback(PlaybackEvent::Started {
                session_id: session_id.to_string(),
                timestamp: now_millis(),
            });
        }
        Ok(())
    }

    /// Graceful end: the stream played out fully.
    fn finish_session(&self, session_id: Uuid) {
        {
            let mut state = self.state.lock();
            if !state.session.as_ref().is_some_and(|s| s.id == session_id) {
                return;
            }
            state.session = None;
            state.phase = PlaybackPhase::Idle;
        }

        log::info!("[Playback] Session {session_id} finished");
        self.emitter.emit_playback(PlaybackEvent::Ended {
            session_id: session_id.to_string(),
            timestamp: now_millis(),
        });
    }

    /// Tears down `session_id` if it is still the live session: cancel the
    /// source, close the buffer, pause and detach the sink, return to Idle.
    ///
    /// With `error` the teardown is reported as a failure; without, as a
    /// user stop.
    fn teardown_session(&self, session_id: Uuid, error: Option<&VocastError>) {
        let session = {
            let mut state = self.state.lock();
            if !state.session.as_ref().is_some_and(|s| s.id == session_id) {
                return;
            }
            state.phase = PlaybackPhase::Stopping;
            state.session.take()
        };
        let Some(session) = session else { return };

        session.cancel.cancel();
        if let Some(handle) = session.handle {
            self.buffers.close(handle);
        }
        self.sink.pause();
        self.sink.detach();

        self.state.lock().phase = PlaybackPhase::Idle;

        let timestamp = now_millis();
        match error {
            Some(e) => {
                self.emitter.emit_playback(PlaybackEvent::Failed {
                    session_id: session_id.to_string(),
                    code: e.code().to_string(),
                    error: e.to_string(),
                    timestamp,
                });
            }
            None => {
                self.emitter.emit_playback(PlaybackEvent::Stopped {
                    session_id: session_id.to_string(),
                    timestamp,
                });
            }
        }
    }

    /// Whether `session_id` is still the live, uncancelled session.
    fn is_current(&self, session_id: Uuid) -> bool {
        let state = self.state.lock();
        state
            .session
            .as_ref()
            .is_some_and(|s| s.id == session_id && !s.cancel.is_cancelled())
    }
}
