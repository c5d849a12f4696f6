//! The `Storage` trait — the contract every cache backend implements.

/// Five synchronous operations over byte strings.
///
/// Implementors are free to be non-thread-safe (see [`crate::lru::LruCache`])
/// or thread-safe (see [`crate::locking::LockingCache`]); the trait itself
/// makes no promise about interior mutability or concurrency, only about
/// behavior.
///
/// All operations that would admit an entry larger than the store's
/// capacity fail cleanly (`false`) and leave the store byte-identical —
/// this is a precondition violation (spec §7), not an error.
pub trait Storage {
    /// Insert or overwrite `key`. Behaves like [`Storage::set`] on a hit,
    /// otherwise admits a new entry, evicting from the head as needed.
    /// Returns `false` only if the entry cannot fit even after evicting
    /// everything else.
    fn put(&self, key: &str, value: &[u8]) -> bool;

    /// Insert `key` only if absent. Returns `false` without side effect
    /// if `key` is already present.
    fn put_if_absent(&self, key: &str, value: &[u8]) -> bool;

    /// Replace the value for `key`. Returns `false` if `key` is absent.
    fn set(&self, key: &str, value: &[u8]) -> bool;

    /// Remove `key`. Returns `false` if `key` was absent.
    fn delete(&self, key: &str) -> bool;

    /// Look up `key`, copying its value into `out` and moving it to the
    /// most-recently-used position. Returns `false` on miss, leaving
    /// `out` untouched.
    fn get(&self, key: &str, out: &mut Vec<u8>) -> bool;
}
