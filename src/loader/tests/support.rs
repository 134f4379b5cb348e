//! Shared test fixtures for the loader tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender, bounded};

use crate::callback::Callback;
use crate::cancel::{CancelFlag, CancelRequest};
use crate::config::PoolConfig;
use crate::context::{ConfinementContext, Job};
use crate::error::LoadError;
use crate::loadable::{Loadable, ProgressNotifier};
use crate::loader::Loader;
use crate::pool::FixedThreadPool;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// A confinement context pumped manually by the test thread, so every
/// delivery happens exactly when the test says so.
pub(crate) struct ManualContext {
    owner: ThreadId,
    jobs: Mutex<VecDeque<Job>>,
}

impl ManualContext {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            owner: thread::current().id(),
            jobs: Mutex::new(VecDeque::new()),
        })
    }

    /// Run every queued job, including jobs queued by the jobs themselves.
    /// Returns the number of jobs run.
    pub(crate) fn pump(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self.jobs.lock().unwrap().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Pump until `done` holds or `timeout` elapses. Returns whether the
    /// predicate was satisfied.
    pub(crate) fn pump_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if done() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl ConfinementContext for ManualContext {
    fn post(&self, job: Job) {
        self.jobs.lock().unwrap().push_back(job);
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }
}

/// Manual context plus a two-worker pool and a loader wired to both.
pub(crate) fn fixture() -> (Arc<ManualContext>, Loader) {
    let context = ManualContext::new();
    let pool = Arc::new(FixedThreadPool::new(PoolConfig::with_threads(2)).unwrap());
    let loader = Loader::new(context.clone(), pool);
    (context, loader)
}

// ----------------------------------------------------------------------
// Recording callback
// ----------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Lifecycle {
    Started,
    Progress(f32),
    Completed,
    Errored(String),
    Canceled(String),
}

pub(crate) type EventLog = Arc<Mutex<Vec<Lifecycle>>>;

pub(crate) struct RecordingCallback {
    log: EventLog,
}

impl RecordingCallback {
    pub(crate) fn new() -> (Box<dyn Callback>, EventLog) {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        (Box::new(Self { log: log.clone() }), log)
    }
}

impl Callback for RecordingCallback {
    fn on_load_start(&mut self) {
        self.log.lock().unwrap().push(Lifecycle::Started);
    }

    fn on_load_progress_changed(&mut self, progress: f32) {
        self.log.lock().unwrap().push(Lifecycle::Progress(progress));
    }

    fn on_load_complete(&mut self) {
        self.log.lock().unwrap().push(Lifecycle::Completed);
    }

    fn on_load_error(&mut self, error: LoadError) {
        self.log.lock().unwrap().push(Lifecycle::Errored(error.to_string()));
    }

    fn on_load_canceled(&mut self, reason: &str) {
        self.log.lock().unwrap().push(Lifecycle::Canceled(reason.to_string()));
    }
}

pub(crate) fn events(log: &EventLog) -> Vec<Lifecycle> {
    log.lock().unwrap().clone()
}

pub(crate) fn terminal_count(log: &EventLog) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|event| {
            matches!(
                event,
                Lifecycle::Completed | Lifecycle::Errored(_) | Lifecycle::Canceled(_)
            )
        })
        .count()
}

// ----------------------------------------------------------------------
// Loadables covering each outcome
// ----------------------------------------------------------------------

/// Blocks in `load` until released through the returned sender, then
/// completes. Cancellation is recorded but deliberately does not release
/// the gate; tests control the release explicitly.
pub(crate) struct GatedLoadable {
    gate: Receiver<()>,
    flag: CancelFlag,
}

impl GatedLoadable {
    pub(crate) fn new() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = bounded(1);
        (
            Arc::new(Self {
                gate: rx,
                flag: CancelFlag::new(),
            }),
            tx,
        )
    }
}

impl Loadable for GatedLoadable {
    fn load(&self, _progress: &dyn ProgressNotifier) -> crate::Result<()> {
        let _ = self.gate.recv_timeout(WAIT);
        Ok(())
    }

    fn cancel(&self, _request: &CancelRequest) {
        self.flag.set();
    }

    fn is_canceled(&self) -> bool {
        self.flag.is_set()
    }
}

/// Fails with an expected I/O-class error.
pub(crate) struct FailingLoadable {
    flag: CancelFlag,
}

impl FailingLoadable {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            flag: CancelFlag::new(),
        })
    }
}

impl Loadable for FailingLoadable {
    fn load(&self, _progress: &dyn ProgressNotifier) -> crate::Result<()> {
        Err(LoadError::Io(std::io::Error::other("segment fetch failed")))
    }

    fn cancel(&self, _request: &CancelRequest) {
        self.flag.set();
    }

    fn is_canceled(&self) -> bool {
        self.flag.is_set()
    }
}

/// Panics on the worker thread; the core downgrades this to a reportable
/// unexpected fault.
pub(crate) struct PanickingLoadable;

impl Loadable for PanickingLoadable {
    fn load(&self, _progress: &dyn ProgressNotifier) -> crate::Result<()> {
        panic!("index out of bounds in frame parser")
    }

    fn cancel(&self, _request: &CancelRequest) {}

    fn is_canceled(&self) -> bool {
        false
    }
}

/// Reports an unrecoverable fault, which must be re-raised, not reported.
pub(crate) struct FatalLoadable;

impl Loadable for FatalLoadable {
    fn load(&self, _progress: &dyn ProgressNotifier) -> crate::Result<()> {
        Err(LoadError::Fatal("decoder state corrupt".to_string()))
    }

    fn cancel(&self, _request: &CancelRequest) {}

    fn is_canceled(&self) -> bool {
        false
    }
}

/// Parks in intervals, polling its cancellation flag each time, the way a
/// well-behaved long-running loadable should.
pub(crate) struct PollingLoadable {
    flag: CancelFlag,
    interval: Duration,
}

impl PollingLoadable {
    pub(crate) fn new(interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            flag: CancelFlag::new(),
            interval,
        })
    }
}

impl Loadable for PollingLoadable {
    fn load(&self, _progress: &dyn ProgressNotifier) -> crate::Result<()> {
        while !self.flag.is_set() {
            thread::park_timeout(self.interval);
        }
        Ok(())
    }

    fn cancel(&self, _request: &CancelRequest) {
        self.flag.set();
    }

    fn is_canceled(&self) -> bool {
        self.flag.is_set()
    }
}

/// Emits a burst of progress values, signals the test that they were all
/// emitted, then blocks on a gate before completing. Lets tests observe
/// coalescing with zero timing assumptions.
pub(crate) struct ProgressLoadable {
    values: Vec<f32>,
    emitted: Sender<()>,
    gate: Receiver<()>,
    flag: CancelFlag,
}

impl ProgressLoadable {
    pub(crate) fn new(values: Vec<f32>) -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (emitted_tx, emitted_rx) = bounded(1);
        let (gate_tx, gate_rx) = bounded(1);
        (
            Arc::new(Self {
                values,
                emitted: emitted_tx,
                gate: gate_rx,
                flag: CancelFlag::new(),
            }),
            emitted_rx,
            gate_tx,
        )
    }
}

impl Loadable for ProgressLoadable {
    fn load(&self, progress: &dyn ProgressNotifier) -> crate::Result<()> {
        for value in &self.values {
            progress.progress_changed(*value);
        }
        let _ = self.emitted.send(());
        let _ = self.gate.recv_timeout(WAIT);
        Ok(())
    }

    fn cancel(&self, _request: &CancelRequest) {
        self.flag.set();
    }

    fn is_canceled(&self) -> bool {
        self.flag.is_set()
    }
}
