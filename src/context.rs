//! Confinement context boundary and the [`RunLoop`] reference implementation
//!
//! All mutable loader state is owned by a single logical execution context.
//! The core only requires two things of it: a way to post work onto it
//! ([`ConfinementContext::post`]) and a way to verify that the current
//! caller is on it ([`ConfinementContext::assert_current`]). Any runtime
//! providing a serial run loop satisfies the contract; [`RunLoop`] is a
//! ready-made implementation backed by a dedicated thread.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Sender};

/// A unit of work posted onto a context or submitted to a worker pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The single logical execution context that owns and serializes all state
/// mutation of a [`Loader`].
///
/// Implementations must run posted jobs serially, in FIFO order, on one
/// logical thread. Every state-mutating loader operation asserts that it is
/// invoked from this context and panics otherwise: thread confinement is a
/// hard contract, not a suggestion.
///
/// [`Loader`]: crate::Loader
pub trait ConfinementContext: Send + Sync {
    /// Enqueue `job` to run later on the context, after all previously
    /// posted jobs. Never blocks.
    fn post(&self, job: Job);

    /// Whether the calling thread is the context.
    fn is_current(&self) -> bool;

    /// Panic unless the calling thread is the context.
    ///
    /// Cross-thread calls into loader state are programmer errors; they
    /// fail fast here instead of corrupting state silently.
    fn assert_current(&self) {
        assert!(
            self.is_current(),
            "loader state accessed off its confinement context"
        );
    }
}

/// A confinement context backed by a dedicated named thread draining a FIFO
/// job queue.
///
/// Handles are cheap to clone and may be shared freely; jobs posted from
/// any thread run serially on the loop thread. The loop exits once every
/// handle has been dropped and the queue has drained. A job that panics
/// tears the loop thread down -- unrecoverable faults are meant to
/// propagate -- and the panic is surfaced by [`RunLoop::join`].
pub struct RunLoop {
    tx: Sender<Job>,
    thread_id: ThreadId,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RunLoop {
    /// Spawn the loop thread under the given name.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tracing::debug!("run loop started");
                while let Ok(job) = rx.recv() {
                    job();
                }
                tracing::debug!("run loop shutting down");
            })?;
        let thread_id = handle.thread().id();
        Ok(Self {
            tx,
            thread_id,
            handle: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Drop this handle and wait for the loop thread to exit.
    ///
    /// Blocks until every other clone of the handle has been dropped as
    /// well. Returns the loop thread's panic payload if a posted job
    /// panicked.
    pub fn join(self) -> thread::Result<()> {
        let Self { tx, handle, .. } = self;
        drop(tx);
        let joined = handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match joined {
            Some(h) => h.join(),
            // Another clone already joined; nothing left to wait for.
            None => Ok(()),
        }
    }
}

impl Clone for RunLoop {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            thread_id: self.thread_id,
            handle: Arc::clone(&self.handle),
        }
    }
}

impl std::fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLoop")
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

impl ConfinementContext for RunLoop {
    fn post(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("run loop thread is gone; dropping posted job");
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}
