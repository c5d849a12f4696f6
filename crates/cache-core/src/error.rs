//! cache-core error types.

use std::fmt;

/// Errors the cache engine can report.
///
/// Every variant corresponds to a precondition violation in spec §7 —
/// none of these unwind past a `Storage` call; callers see a clean
/// `Err`/`false` and the store is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// `key.len() + value.len()` exceeds `max_size`; the request is
    /// inherently too big for this cache, regardless of eviction.
    EntryTooLarge { needed: usize, max_size: usize },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryTooLarge { needed, max_size } => write!(
                f,
                "entry of {needed} bytes exceeds cache capacity of {max_size} bytes"
            ),
        }
    }
}

impl std::error::Error for CacheError {}

pub type Result<T> = std::result::Result<T, CacheError>;
