//! Aggregate task coordination -- the [`Loader`]
//!
//! A loader owns zero or more concurrently in-flight load tasks and
//! derives its aggregate state from them:
//!
//! - `Idle`: no tasks enqueued, no cancel issued.
//! - `Loading`: at least one task enqueued and not canceling.
//! - canceling: a cancel was issued while tasks were in flight; entered
//!   via [`Loader::cancel`] and left only into `Canceled`.
//! - `Canceled`: permanent terminal state for this loader instance,
//!   reached once the last task deregisters after a cancel (or
//!   immediately, if cancel arrives while idle).
//!
//! Every state-mutating method and every query must be invoked from the
//! confinement context; violations panic.

mod task;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::callback::Callback;
use crate::cancel::CancelRequest;
use crate::context::ConfinementContext;
use crate::loadable::Loadable;
use crate::pool::WorkerPool;

use task::{LoadTask, lock};

/// Shared loader state; tasks hold a weak reference back for
/// deregistration.
pub(crate) struct LoaderCore {
    context: Arc<dyn ConfinementContext>,
    pool: Arc<dyn WorkerPool>,
    /// Insertion-ordered, no duplicates. Mutated only on the context.
    tasks: Mutex<Vec<Arc<LoadTask>>>,
    canceling: AtomicBool,
    canceled: AtomicBool,
    next_task_id: AtomicU64,
}

impl LoaderCore {
    /// Remove a finished task and recompute the aggregate state. Called by
    /// the task itself, on the context, exactly once per task.
    pub(crate) fn deregister(&self, task: &Arc<LoadTask>) {
        let remaining = {
            let mut tasks = lock(&self.tasks);
            tasks.retain(|t| !Arc::ptr_eq(t, task));
            tasks.len()
        };
        tracing::debug!(task_id = task.id(), remaining, "task deregistered");
        if remaining == 0 && self.canceling.load(Ordering::SeqCst) {
            self.canceling.store(false, Ordering::SeqCst);
            self.canceled.store(true, Ordering::SeqCst);
            tracing::debug!("last task deregistered; loader canceled");
        }
    }
}

/// Runs [`Loadable`]s on a worker pool while delivering strictly ordered
/// lifecycle events to [`Callback`]s on the confinement context.
///
/// Cloning yields another handle to the same loader. A loader cycles
/// between `Idle` and `Loading` indefinitely, or -- once canceled -- stays
/// `Canceled` forever and must be discarded.
///
/// # Panics
///
/// Every method panics when invoked off the confinement context, and
/// [`start_load`](Loader::start_load) additionally panics on a canceled or
/// canceling loader. Both are programmer errors, not runtime conditions.
#[derive(Clone)]
pub struct Loader {
    core: Arc<LoaderCore>,
}

impl Loader {
    /// Create a loader bound to the given confinement context and worker
    /// pool.
    pub fn new(context: Arc<dyn ConfinementContext>, pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            core: Arc::new(LoaderCore {
                context,
                pool,
                tasks: Mutex::new(Vec::new()),
                canceling: AtomicBool::new(false),
                canceled: AtomicBool::new(false),
                next_task_id: AtomicU64::new(0),
            }),
        }
    }

    /// Start loading: create a task, register it, fire `on_load_start`,
    /// and submit the loadable to the worker pool. Returns without
    /// blocking; all subsequent events arrive through `callback`.
    ///
    /// # Panics
    ///
    /// If the loader is `Canceled` or currently canceling, or when called
    /// off the confinement context.
    pub fn start_load(&self, loadable: Arc<dyn Loadable>, callback: Box<dyn Callback>) {
        self.core.context.assert_current();
        assert!(
            !self.core.canceled.load(Ordering::SeqCst)
                && !self.core.canceling.load(Ordering::SeqCst),
            "start_load on a canceled or canceling loader"
        );
        let id = self.core.next_task_id.fetch_add(1, Ordering::SeqCst);
        let task = LoadTask::new(
            id,
            Arc::clone(&self.core.context),
            loadable,
            callback,
            Arc::downgrade(&self.core),
        );
        let in_flight = {
            let mut tasks = lock(&self.core.tasks);
            tasks.push(Arc::clone(&task));
            tasks.len()
        };
        tracing::debug!(task_id = id, in_flight, "starting load");
        task.start(self.core.pool.as_ref());
    }

    /// Cancel the loader.
    ///
    /// From `Idle` this transitions directly -- and permanently -- to
    /// `Canceled`. From `Loading` it marks the loader canceling and
    /// forwards the request to every enqueued task; `Canceled` is reached
    /// once the last task deregisters. Each still-enqueued task receives
    /// its own `on_load_canceled` (unless the request is silent). No-op on
    /// an already-canceled loader.
    pub fn cancel(&self, request: CancelRequest) {
        self.core.context.assert_current();
        if self.core.canceled.load(Ordering::SeqCst) {
            return;
        }
        let tasks: Vec<Arc<LoadTask>> = lock(&self.core.tasks).clone();
        if tasks.is_empty() {
            self.core.canceled.store(true, Ordering::SeqCst);
            tracing::debug!(reason = %request.reason(), "loader canceled while idle");
            return;
        }
        self.core.canceling.store(true, Ordering::SeqCst);
        tracing::debug!(
            tasks = tasks.len(),
            reason = %request.reason(),
            "canceling in-flight load tasks"
        );
        for task in tasks {
            task.cancel(&request);
        }
    }

    /// Advisory capacity hint: whether the pool's maximum parallelism
    /// exceeds the number of currently enqueued tasks.
    ///
    /// With a pool whose internal queue is unbounded, `submit` never
    /// blocks or rejects, so this is soft admission control only -- do not
    /// rely on it for correctness.
    pub fn is_free(&self) -> bool {
        self.core.context.assert_current();
        self.core.pool.max_parallelism() > lock(&self.core.tasks).len()
    }

    /// No tasks enqueued and no cancel ever issued.
    pub fn is_idle(&self) -> bool {
        self.core.context.assert_current();
        !self.core.canceled.load(Ordering::SeqCst)
            && !self.core.canceling.load(Ordering::SeqCst)
            && lock(&self.core.tasks).is_empty()
    }

    /// At least one task enqueued and not canceling.
    pub fn is_loading(&self) -> bool {
        self.core.context.assert_current();
        !self.core.canceled.load(Ordering::SeqCst)
            && !self.core.canceling.load(Ordering::SeqCst)
            && !lock(&self.core.tasks).is_empty()
    }

    /// A cancel was issued and tasks are still draining.
    pub fn is_canceling(&self) -> bool {
        self.core.context.assert_current();
        self.core.canceling.load(Ordering::SeqCst)
    }

    /// The loader reached its permanent terminal state.
    pub fn is_canceled(&self) -> bool {
        self.core.context.assert_current();
        self.core.canceled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("tasks", &lock(&self.core.tasks).len())
            .field("canceling", &self.core.canceling.load(Ordering::SeqCst))
            .field("canceled", &self.core.canceled.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
