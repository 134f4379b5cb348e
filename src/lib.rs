//! # task-loader
//!
//! Cancellable asynchronous task loader with strictly ordered lifecycle
//! events.
//!
//! A [`Loader`] runs user-supplied blocking work ([`Loadable`]) on a
//! bounded worker pool while delivering a single-consumer event stream
//! (start / progress / complete / error / cancel) to a [`Callback`] on one
//! logical owner context.
//!
//! ## Design Philosophy
//!
//! - **Library-first** -- no CLI or UI, purely a Rust crate for embedding.
//! - **Thread-confined** -- all loader state is owned by a single
//!   [`ConfinementContext`]; cross-thread mutation fails fast.
//! - **Strict ordering** -- per task: `on_load_start` exactly once, then
//!   zero or more progress events (coalesced to the latest pending value),
//!   then exactly one terminal event.
//! - **Cooperative cancellation** -- loadables poll a flag; interrupt
//!   escalation unparks the worker thread, best-effort.
//! - **Two-tier failures** -- recoverable failures are reported through
//!   the callback; [`LoadError::Fatal`] re-raises on the context so true
//!   defects are never masked.
//!
//! Not a general job scheduler: no priority queues, no retry policy, no
//! persistence of in-flight work across restarts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use task_loader::{
//!     Callback, CancelRequest, ConfinementContext, FixedThreadPool, LoadError, Loadable,
//!     Loader, PoolConfig, ProgressNotifier, RunLoop,
//! };
//!
//! struct Preload;
//!
//! impl Loadable for Preload {
//!     fn load(&self, progress: &dyn ProgressNotifier) -> task_loader::Result<()> {
//!         progress.progress_changed(1.0);
//!         Ok(())
//!     }
//!     fn cancel(&self, _request: &CancelRequest) {}
//!     fn is_canceled(&self) -> bool {
//!         false
//!     }
//! }
//!
//! struct Sink;
//!
//! impl Callback for Sink {
//!     fn on_load_start(&mut self) {}
//!     fn on_load_progress_changed(&mut self, progress: f32) {
//!         println!("progress: {progress}");
//!     }
//!     fn on_load_complete(&mut self) {
//!         println!("done");
//!     }
//!     fn on_load_error(&mut self, error: LoadError) {
//!         eprintln!("failed: {error}");
//!     }
//!     fn on_load_canceled(&mut self, reason: &str) {
//!         println!("canceled: {reason}");
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = Arc::new(RunLoop::spawn("loader")?);
//!     let pool = Arc::new(FixedThreadPool::new(PoolConfig::default())?);
//!
//!     // All loader calls happen on the confinement context.
//!     let loader_context = Arc::clone(&context);
//!     context.post(Box::new(move || {
//!         let loader = Loader::new(loader_context, pool);
//!         loader.start_load(Arc::new(Preload), Box::new(Sink));
//!     }));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Lifecycle callback contract
pub mod callback;
/// Cancellation requests and the cooperative cancel flag
pub mod cancel;
/// Configuration types
pub mod config;
/// Confinement context boundary and run loop
pub mod context;
/// Error types
pub mod error;
/// The unit-of-work contract
pub mod loadable;
/// Core loader and task state machine
pub mod loader;
/// Worker pool boundary and fixed thread pool
pub mod pool;

// Re-export commonly used types
pub use callback::Callback;
pub use cancel::{CancelFlag, CancelRequest};
pub use config::PoolConfig;
pub use context::{ConfinementContext, Job, RunLoop};
pub use error::{LoadError, Result, SetupError};
pub use loadable::{Loadable, ProgressNotifier};
pub use loader::Loader;
pub use pool::{FixedThreadPool, WorkerPool};
