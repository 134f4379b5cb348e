//! Cancellation requests and the cooperative cancellation flag
//!
//! Cancellation in this crate is cooperative: a [`CancelRequest`] asks a
//! loadable to stop, and the loadable is expected to poll its own flag and
//! return promptly. The request carries two escalations beyond the plain
//! form:
//! - **interrupting**: additionally unpark the worker thread running
//!   `load`, waking loadables blocked in `park`/`park_timeout`. Best-effort
//!   only; a loadable blocked in an uninterruptible call will not notice.
//! - **silent**: suppress every remaining callback for the affected tasks,
//!   including the terminal `on_load_canceled`. This is an explicit,
//!   deliberate variant for callers that no longer care about the result;
//!   it is not the default.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A request to cancel one task or a whole loader.
///
/// Constructed with [`CancelRequest::new`] and refined with the builder
/// methods. The reason string is free-text diagnostics, delivered verbatim
/// with `on_load_canceled`.
///
/// # Example
///
/// ```
/// use task_loader::CancelRequest;
///
/// // Deliver on_load_canceled, wake a parked worker:
/// let request = CancelRequest::new("user navigated away").interrupting();
/// assert!(request.interrupts());
/// assert!(request.notifies());
/// ```
#[derive(Clone, Debug)]
pub struct CancelRequest {
    reason: String,
    interrupt: bool,
    notify: bool,
}

impl CancelRequest {
    /// A plain cancel: the terminal `on_load_canceled` callback will be
    /// delivered, and the worker thread is left alone.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            interrupt: false,
            notify: true,
        }
    }

    /// Also unpark the worker thread executing `load` (best-effort
    /// interrupt escalation).
    #[must_use]
    pub fn interrupting(mut self) -> Self {
        self.interrupt = true;
        self
    }

    /// Silent cancel: suppress **all** further callbacks for the affected
    /// tasks, including the terminal one. Use when the owner no longer
    /// cares about the outcome at all.
    #[must_use]
    pub fn silently(mut self) -> Self {
        self.notify = false;
        self
    }

    /// The free-text diagnostic reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Whether the worker thread should be unparked.
    pub fn interrupts(&self) -> bool {
        self.interrupt
    }

    /// Whether callbacks keep being delivered (false for a silent cancel).
    pub fn notifies(&self) -> bool {
        self.notify
    }
}

/// Shared atomic cancellation flag for [`Loadable`] implementations.
///
/// Implements the set/poll pattern every cooperative loadable needs: the
/// confinement context sets the flag from `Loadable::cancel`, the worker
/// thread polls it from `load`. Cloning is cheap and clones observe the
/// same flag.
///
/// [`Loadable`]: crate::Loadable
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent, never blocks.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
