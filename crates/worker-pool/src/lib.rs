//! # worker-pool
//!
//! An elastic thread pool with low/high watermarks, a bounded task
//! queue, idle-time contraction, and await-stop semantics — the second
//! of the three core subsystems this workspace implements (see
//! `SPEC_FULL.md`).

pub mod config;
pub mod pool;
pub mod task;

pub use config::PoolConfig;
pub use pool::WorkerPool;
pub use task::Task;
