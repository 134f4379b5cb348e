//! The [`Callback`] contract -- the five-method lifecycle sink

use crate::error::LoadError;

/// Observer for a single task's lifecycle.
///
/// All methods are invoked on the confinement context. For one task the
/// delivery order is exactly:
///
/// 1. [`on_load_start`](Callback::on_load_start), exactly once;
/// 2. zero or more
///    [`on_load_progress_changed`](Callback::on_load_progress_changed);
/// 3. exactly one terminal event:
///    [`on_load_complete`](Callback::on_load_complete),
///    [`on_load_error`](Callback::on_load_error), or
///    [`on_load_canceled`](Callback::on_load_canceled).
///
/// No callback fires after the terminal one. If the task was canceled
/// silently (see [`CancelRequest::silently`](crate::CancelRequest::silently)),
/// no further callbacks fire at all, the terminal one included.
pub trait Callback: Send + 'static {
    /// The task was submitted to the worker pool and is now running.
    fn on_load_start(&mut self);

    /// The loadable reported progress. Values coalesce; only the latest
    /// pending value is delivered.
    fn on_load_progress_changed(&mut self, progress: f32);

    /// The loadable finished successfully.
    fn on_load_complete(&mut self);

    /// The loadable failed with a recoverable error.
    fn on_load_error(&mut self, error: LoadError);

    /// The task was canceled; `reason` is the free-text diagnostic from
    /// the cancel request.
    fn on_load_canceled(&mut self, reason: &str);
}
