//! Loader and task state machine tests
//!
//! Split by concern:
//! - [`lifecycle`] - event ordering, terminal outcomes, progress coalescing
//! - [`cancellation`] - cancel races, silent cancel, interrupt escalation
//! - [`aggregate`] - loader aggregate state, capacity hint, confinement
//!
//! Shared fixtures live in [`support`]: a manually pumped confinement
//! context so every delivery is deterministic, a recording callback, and a
//! small zoo of loadables covering each outcome.

mod support;
