//! Per-submission state machine and event bridge
//!
//! A [`LoadTask`] sits between one worker pool thread (running the
//! loadable) and the confinement context (owning the state and receiving
//! the callbacks). The worker side never mutates task state directly: it
//! only stores progress into a single-slot buffer and posts jobs onto the
//! context. Every state transition happens on the context.
//!
//! States: `Idle -> Started -> {Completed | Errored | Canceled}`, flat, no
//! re-entry. Every terminal transition runs `finish` exactly once, clearing
//! the loadable/callback/loader references so nothing is retained after
//! completion.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::Thread;

use crate::callback::Callback;
use crate::cancel::CancelRequest;
use crate::context::ConfinementContext;
use crate::error::LoadError;
use crate::loadable::{Loadable, ProgressNotifier};
use crate::loader::LoaderCore;
use crate::pool::WorkerPool;

/// Lock that shrugs off poisoning: state consistency is maintained by the
/// confinement contract, and a fatal fault re-raised on the context must
/// not wedge every later lock behind a poison error.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Completed,
    Errored,
    Canceled,
}

/// What the worker thread observed when `load` returned.
enum WorkerOutcome {
    Completed,
    Failed(LoadError),
    Canceled,
    Fatal(String),
}

pub(crate) struct LoadTask {
    id: u64,
    context: Arc<dyn ConfinementContext>,
    /// Written only from the confinement context.
    phase: Mutex<Phase>,
    /// Set from the context, read from the worker and at delivery time.
    canceling: AtomicBool,
    /// Cleared by a silent cancel; suppresses every remaining callback.
    notify: AtomicBool,
    cancel_reason: Mutex<Option<String>>,
    /// References released on finish so nothing outlives the task.
    loadable: Mutex<Option<Arc<dyn Loadable>>>,
    callback: Mutex<Option<Box<dyn Callback>>>,
    loader: Mutex<Option<Weak<LoaderCore>>>,
    /// Single-slot progress buffer: at most one pending value, newer
    /// values overwrite undelivered ones.
    pending_progress: Mutex<Option<f32>>,
    /// Worker thread handle while `load` runs, for interrupt escalation.
    worker: Mutex<Option<Thread>>,
}

impl LoadTask {
    pub(crate) fn new(
        id: u64,
        context: Arc<dyn ConfinementContext>,
        loadable: Arc<dyn Loadable>,
        callback: Box<dyn Callback>,
        loader: Weak<LoaderCore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            context,
            phase: Mutex::new(Phase::Idle),
            canceling: AtomicBool::new(false),
            notify: AtomicBool::new(true),
            cancel_reason: Mutex::new(None),
            loadable: Mutex::new(Some(loadable)),
            callback: Mutex::new(Some(callback)),
            loader: Mutex::new(Some(loader)),
            pending_progress: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Transition `Idle -> Started`, fire `on_load_start`, and submit the
    /// work to the pool. Runs synchronously inside `Loader::start_load`.
    pub(crate) fn start(self: &Arc<Self>, pool: &dyn WorkerPool) {
        {
            let mut phase = lock(&self.phase);
            debug_assert_eq!(*phase, Phase::Idle, "task started twice");
            *phase = Phase::Started;
        }
        tracing::debug!(task_id = self.id, "load task started");
        self.with_callback(|cb| cb.on_load_start());
        let task = Arc::clone(self);
        pool.submit(Box::new(move || task.run_on_worker()));
    }

    /// Cancel this task. Runs on the confinement context.
    pub(crate) fn cancel(self: &Arc<Self>, request: &CancelRequest) {
        let phase = *lock(&self.phase);
        match phase {
            Phase::Idle => {
                // Start is synchronous, so a cancel should never find the
                // task still idle; handle it anyway by going straight to
                // the terminal state.
                self.record_cancel(request);
                self.finish_canceled();
            }
            Phase::Started => {
                self.record_cancel(request);
                self.canceling.store(true, Ordering::SeqCst);
                let loadable = lock(&self.loadable).clone();
                if let Some(loadable) = loadable {
                    loadable.cancel(request);
                }
                if request.interrupts() {
                    let worker = lock(&self.worker).clone();
                    if let Some(worker) = worker {
                        worker.unpark();
                    }
                }
                tracing::debug!(
                    task_id = self.id,
                    reason = %request.reason(),
                    interrupt = request.interrupts(),
                    notify = request.notifies(),
                    "cancel requested"
                );
            }
            // Already terminal; nothing to cancel.
            Phase::Completed | Phase::Errored | Phase::Canceled => {}
        }
    }

    fn record_cancel(&self, request: &CancelRequest) {
        if !request.notifies() {
            self.notify.store(false, Ordering::SeqCst);
        }
        let mut reason = lock(&self.cancel_reason);
        // First reason wins; a repeated cancel does not rewrite history.
        if reason.is_none() {
            *reason = Some(request.reason().to_string());
        }
    }

    // ------------------------------------------------------------------
    // Worker side
    // ------------------------------------------------------------------

    /// Execute the loadable on the worker pool thread and post the
    /// resulting terminal event back onto the context.
    fn run_on_worker(self: Arc<Self>) {
        let Some(loadable) = lock(&self.loadable).clone() else {
            // Finished before the pool got to us; nothing to run.
            return;
        };
        *lock(&self.worker) = Some(std::thread::current());

        let outcome = if loadable.is_canceled() {
            WorkerOutcome::Canceled
        } else {
            let notifier = WorkerNotifier { task: &self };
            let result = panic::catch_unwind(AssertUnwindSafe(|| loadable.load(&notifier)));
            match result {
                Ok(Ok(())) => {
                    if loadable.is_canceled() {
                        WorkerOutcome::Canceled
                    } else {
                        WorkerOutcome::Completed
                    }
                }
                Ok(Err(LoadError::Fatal(message))) => WorkerOutcome::Fatal(message),
                Ok(Err(error)) => {
                    if loadable.is_canceled() {
                        // Cancellation won the race; the error is noise.
                        WorkerOutcome::Canceled
                    } else {
                        WorkerOutcome::Failed(error)
                    }
                }
                Err(payload) => WorkerOutcome::Failed(LoadError::from_panic(payload)),
            }
        };

        *lock(&self.worker) = None;
        let task = Arc::clone(&self);
        self.context
            .post(Box::new(move || task.on_worker_done(outcome)));
    }

    /// Store a progress value in the single-slot buffer and schedule a
    /// delivery if none is pending. Worker thread only.
    fn progress_from_worker(self: &Arc<Self>, value: f32) {
        if !self.notify.load(Ordering::SeqCst) || self.canceling.load(Ordering::SeqCst) {
            return;
        }
        let was_empty = {
            let mut slot = lock(&self.pending_progress);
            let was_empty = slot.is_none();
            *slot = Some(value);
            was_empty
        };
        if was_empty {
            let task = Arc::clone(self);
            self.context.post(Box::new(move || task.deliver_progress()));
        }
    }

    // ------------------------------------------------------------------
    // Context side
    // ------------------------------------------------------------------

    fn deliver_progress(self: Arc<Self>) {
        let Some(value) = lock(&self.pending_progress).take() else {
            return;
        };
        if *lock(&self.phase) != Phase::Started {
            return;
        }
        if self.canceling.load(Ordering::SeqCst) {
            tracing::debug!(task_id = self.id, "dropping progress while canceling");
            return;
        }
        self.with_callback(|cb| cb.on_load_progress_changed(value));
    }

    fn on_worker_done(self: Arc<Self>, outcome: WorkerOutcome) {
        if *lock(&self.phase) != Phase::Started {
            tracing::warn!(task_id = self.id, "ignoring worker event for finished task");
            return;
        }
        match outcome {
            // A fatal fault is never masked, cancellation or not: finish
            // the task first so the loader is not left with a phantom
            // entry, then re-raise on the context.
            WorkerOutcome::Fatal(message) => {
                self.finish(Phase::Errored);
                tracing::error!(task_id = self.id, "re-raising fatal loadable fault");
                panic!("fatal fault in loadable: {message}");
            }
            _ if self.canceling.load(Ordering::SeqCst) => self.finish_canceled(),
            WorkerOutcome::Canceled => self.finish_canceled(),
            WorkerOutcome::Completed => {
                let callback = self.finish(Phase::Completed);
                tracing::debug!(task_id = self.id, "load task completed");
                if let Some(mut callback) = callback {
                    callback.on_load_complete();
                }
            }
            WorkerOutcome::Failed(error) => {
                let callback = self.finish(Phase::Errored);
                tracing::debug!(task_id = self.id, error = %error, "load task failed");
                if let Some(mut callback) = callback {
                    callback.on_load_error(error);
                }
            }
        }
    }

    fn finish_canceled(self: &Arc<Self>) {
        let reason = lock(&self.cancel_reason)
            .take()
            .unwrap_or_else(|| "canceled".to_string());
        let callback = self.finish(Phase::Canceled);
        tracing::debug!(task_id = self.id, reason = %reason, "load task canceled");
        if let Some(mut callback) = callback {
            callback.on_load_canceled(&reason);
        }
    }

    /// Enter a terminal phase: release the loadable/callback/loader
    /// references, clear pending progress, and deregister from the owning
    /// loader. Returns the callback for terminal delivery unless events
    /// are suppressed. Guarded by the phase check in the callers, so it
    /// runs at most once per task.
    fn finish(self: &Arc<Self>, terminal: Phase) -> Option<Box<dyn Callback>> {
        {
            let mut phase = lock(&self.phase);
            debug_assert!(
                matches!(*phase, Phase::Idle | Phase::Started),
                "task finished twice"
            );
            *phase = terminal;
        }
        let _loadable = lock(&self.loadable).take();
        let callback = lock(&self.callback).take();
        let loader = lock(&self.loader).take();
        *lock(&self.pending_progress) = None;
        *lock(&self.worker) = None;

        // Deregister before the terminal callback so the loader's
        // aggregate state is already settled when the owner observes the
        // event (and so the owner may immediately start a new load).
        if let Some(loader) = loader.and_then(|weak| weak.upgrade()) {
            loader.deregister(self);
        }

        if self.notify.load(Ordering::SeqCst) {
            callback
        } else {
            None
        }
    }

    /// Invoke a non-terminal callback method. The callback is temporarily
    /// taken out of its slot so the invocation holds no lock; a finish
    /// cannot run re-entrantly (terminal events only arrive via posted
    /// jobs), so putting it back is safe.
    fn with_callback(&self, f: impl FnOnce(&mut dyn Callback)) {
        if !self.notify.load(Ordering::SeqCst) {
            return;
        }
        let taken = lock(&self.callback).take();
        if let Some(mut callback) = taken {
            f(callback.as_mut());
            *lock(&self.callback) = Some(callback);
        }
    }
}

impl std::fmt::Debug for LoadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTask")
            .field("id", &self.id)
            .field("phase", &*lock(&self.phase))
            .field("canceling", &self.canceling.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Borrow-based notifier handed to `Loadable::load`; forwards into the
/// task's single-slot buffer.
struct WorkerNotifier<'a> {
    task: &'a Arc<LoadTask>,
}

impl ProgressNotifier for WorkerNotifier<'_> {
    fn progress_changed(&self, progress: f32) {
        self.task.progress_from_worker(progress);
    }
}
