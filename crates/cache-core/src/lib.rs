//! # cache-core
//!
//! The Storage trait, the bounded LRU cache engine, and the single-mutex
//! locking wrapper that exposes it as a thread-safe `Storage` — the
//! first of the three core subsystems this workspace implements (see
//! `SPEC_FULL.md`).

pub mod entry;
pub mod env;
pub mod error;
pub mod locking;
pub mod lru;
pub mod storage;

pub use error::{CacheError, Result};
pub use locking::LockingCache;
pub use lru::LruCache;
pub use storage::Storage;
