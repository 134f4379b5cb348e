//! The [`Loadable`] contract -- the caller-supplied unit of work
//!
//! A loadable is the only thing that differs per use-case (media preload,
//! network fetch, cache warm-up, ...). Everything else -- scheduling, event
//! ordering, cancellation plumbing, failure classification -- is the
//! loader's job.

use crate::cancel::CancelRequest;
use crate::error::Result;

/// Sink for progress reports from a running [`Loadable`].
///
/// May be called any number of times from the worker thread. Deliveries
/// coalesce: if a new value arrives before the previous one reached the
/// callback, the stale one is discarded and only the latest is delivered.
pub trait ProgressNotifier {
    /// Report the current progress, conventionally in `0.0..=1.0`.
    fn progress_changed(&self, progress: f32);
}

/// A unit of asynchronous work executed by a [`Loader`].
///
/// # Contract
///
/// - [`load`](Loadable::load) runs on a worker pool thread, fully
///   concurrently with the confinement context. It must poll
///   [`is_canceled`](Loadable::is_canceled) (or its own flag) and return
///   promptly once cancellation is requested. Blocking waits should use
///   `std::thread::park_timeout` or another wakeable primitive so that an
///   interrupting cancel, which unparks the worker thread, takes effect.
/// - [`cancel`](Loadable::cancel) is invoked from the confinement context
///   while `load` may still be running. It must set an internal
///   cancellation flag observable from the worker thread and must not
///   block. [`CancelFlag`](crate::CancelFlag) implements this pattern.
/// - Returning [`LoadError::Fatal`](crate::LoadError::Fatal) marks the
///   failure unrecoverable: it is re-raised on the confinement context
///   instead of being reported through the callback. A panic inside
///   `load`, by contrast, is caught and downgraded to a reportable
///   [`LoadError::Unexpected`](crate::LoadError::Unexpected).
///
/// Cancellation has no built-in timeout: a loadable that ignores its flag
/// and never returns leaves its worker thread occupied indefinitely.
/// Callers needing hard deadlines must build them into `load`.
///
/// [`Loader`]: crate::Loader
pub trait Loadable: Send + Sync + 'static {
    /// Perform the work. Runs on a worker pool thread.
    fn load(&self, progress: &dyn ProgressNotifier) -> Result<()>;

    /// Request cooperative cancellation. Runs on the confinement context;
    /// must not block.
    fn cancel(&self, request: &CancelRequest);

    /// Whether cancellation has been requested on this loadable.
    fn is_canceled(&self) -> bool;
}
