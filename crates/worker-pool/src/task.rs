//! The unit of work the pool schedules.

/// A zero-argument, one-shot callable submitted via [`crate::WorkerPool::execute`].
///
/// Opaque to the pool: no return value, no join handle (spec §3). A
/// task that panics takes down the worker thread that ran it, same as
/// the teacher's thread-spawning call sites — the pool does not catch
/// unwinds on the caller's behalf (spec §7: "tasks are expected to
/// handle their own failures").
pub type Task = Box<dyn FnOnce() + Send + 'static>;
