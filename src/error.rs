//! Error types for task-loader
//!
//! One error type crosses the callback boundary: [`LoadError`]. Its variants
//! encode the failure taxonomy:
//! - Expected I/O-class failures and unexpected runtime faults are
//!   *recoverable*: the task terminates and reports them once via
//!   `Callback::on_load_error`; the loader keeps running.
//! - [`LoadError::Fatal`] is *unrecoverable*: it is never converted into a
//!   callback and is re-raised on the confinement context instead, so true
//!   defects propagate like any other unhandled fault.
//!
//! Illegal usage (calling mutating methods off the confinement context,
//! starting a task on a canceled loader) is a programmer error and panics
//! rather than producing an error value.

use std::any::Any;

use thiserror::Error;

/// Result type alias for task-loader operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Failure reported by (or on behalf of) a running [`Loadable`].
///
/// This is the single error type a [`Callback`] has to handle: whatever went
/// wrong inside `load`, the recoverable kinds arrive wrapped in one of the
/// variants below.
///
/// [`Loadable`]: crate::Loadable
/// [`Callback`]: crate::Callback
#[derive(Debug, Error)]
pub enum LoadError {
    /// Expected I/O-class failure during `load` (network drop, missing
    /// file, ...). Reported via `on_load_error`; the loader continues.
    #[error("load failed: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected runtime fault inside `load`.
    ///
    /// Produced by the core when a loadable panics on its worker thread,
    /// or returned directly by a loadable. Deliberately downgraded to a
    /// reportable error so one bad task cannot silently vanish.
    #[error("unexpected fault in loadable: {0}")]
    Unexpected(String),

    /// Unrecoverable fault.
    ///
    /// Never delivered through a callback: the owning task finishes
    /// silently and the fault is re-raised on the confinement context,
    /// terminating it like any other unhandled defect.
    #[error("fatal fault in loadable: {0}")]
    Fatal(String),
}

impl LoadError {
    /// Whether this failure is contained by the loader and reported via
    /// `on_load_error`, as opposed to re-raised.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LoadError::Fatal(_))
    }

    /// Wrap a caught worker-thread panic payload as an unexpected fault.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "loadable panicked with a non-string payload".to_string());
        LoadError::Unexpected(message)
    }
}

/// Error constructing one of the runtime building blocks ([`RunLoop`],
/// [`FixedThreadPool`]).
///
/// [`RunLoop`]: crate::RunLoop
/// [`FixedThreadPool`]: crate::FixedThreadPool
#[derive(Debug, Error)]
pub enum SetupError {
    /// Invalid configuration value
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description of the invalid setting
        message: String,
    },

    /// The operating system refused to spawn a thread
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}
