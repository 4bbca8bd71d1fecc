//! Task spawning abstraction for runtime independence.
//!
//! The playback controller runs its chunk pump as a background task. The
//! [`TaskSpawner`] trait lets it do so without binding the library to a
//! specific async runtime host: a desktop shell can route spawns through its
//! own runtime while headless hosts use Tokio directly via [`TokioSpawner`].

use std::future::Future;

/// Abstraction for spawning background tasks.
///
/// Implementations should ensure tasks are properly tracked and can complete
/// even if the spawner is dropped.
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future as a background task.
    ///
    /// The task runs independently of the caller and continues until
    /// completion; cancellation is expressed in the task itself (the pump
    /// watches its session's cancellation token), not through the spawner.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Tokio-based spawner for headless hosts and general use.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}
