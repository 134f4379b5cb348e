//! Worker pool boundary and the [`FixedThreadPool`] reference implementation
//!
//! The core asks only two things of a pool: run submitted jobs with some
//! bounded maximum degree of parallelism, and report that bound. Whether
//! the pool queues, rejects, or elastically grows beyond the bound is the
//! pool's business; [`Loader::is_free`] compares enqueued tasks against
//! `max_parallelism` and is therefore an advisory capacity hint, never a
//! non-blocking guarantee.
//!
//! [`Loader::is_free`]: crate::Loader::is_free

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

use crate::config::PoolConfig;
use crate::context::Job;
use crate::error::SetupError;

/// An executor capable of running submitted units of work concurrently,
/// bounded by a configured maximum degree of parallelism.
pub trait WorkerPool: Send + Sync {
    /// Submit a job for execution. Must not block the caller; excess jobs
    /// may queue inside the pool.
    fn submit(&self, job: Job);

    /// The configured maximum number of jobs running concurrently.
    fn max_parallelism(&self) -> usize;
}

/// A fixed-size pool of named worker threads fed from a shared FIFO queue.
///
/// The queue is unbounded, so `submit` never blocks: jobs beyond the
/// thread count wait their turn. Workers exit once every handle to the
/// pool has been dropped and the queue has drained.
pub struct FixedThreadPool {
    tx: Sender<Job>,
    parallelism: usize,
    workers: Vec<JoinHandle<()>>,
}

impl FixedThreadPool {
    /// Build a pool from the given configuration.
    pub fn new(config: PoolConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let (tx, rx) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(config.threads);
        for index in 0..config.threads {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })?;
            workers.push(handle);
        }
        tracing::debug!(threads = config.threads, "worker pool started");
        Ok(Self {
            tx,
            parallelism: config.threads,
            workers,
        })
    }

    /// Stop accepting work and wait for the workers to drain the queue and
    /// exit. Panics from worker jobs are surfaced here.
    pub fn shutdown(self) -> thread::Result<()> {
        let Self { tx, workers, .. } = self;
        drop(tx);
        for worker in workers {
            worker.join()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FixedThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedThreadPool")
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl WorkerPool for FixedThreadPool {
    fn submit(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("worker pool is shut down; dropping submitted job");
        }
    }

    fn max_parallelism(&self) -> usize {
        self.parallelism
    }
}
