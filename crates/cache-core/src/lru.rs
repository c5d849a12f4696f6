//! Bounded LRU cache engine.
//!
//! Single-threaded by design (spec §4.1/§4.2, §9 second bullet): the
//! engine assumes exclusive access and is made thread-safe only by the
//! single-mutex [`crate::locking::LockingCache`] wrapper, never by a
//! lock-free structure internally. See the original Afina
//! `SimpleLRU`/`ThreadSafeSimpleLRU` split this mirrors.

use std::collections::HashMap;

use crate::entry::{Arena, Slot};
use crate::error::{CacheError, Result};

/// A bounded, strict-LRU-eviction key/value store.
///
/// Maintains the invariants from spec §3:
/// - `current_size == Σ(|k|+|v|)` over all live entries, always `≤ max_size`.
/// - the index and the recency list hold exactly the same keys.
/// - the recency list is acyclic with a unique head (LRU) and tail (MRU).
#[derive(Debug)]
pub struct LruCache {
    max_size: usize,
    current_size: usize,
    index: HashMap<String, usize>,
    arena: Arena,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruCache {
    /// Create an empty cache bounded to `max_size` accounted bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            current_size: 0,
            index: HashMap::new(),
            arena: Arena::new(),
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[inline]
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ── Public operations (spec §4.1) ──────────────────────────────

    /// `Put(k, v)`: `Set` on a hit, admit-with-eviction on a miss.
    pub fn put(&mut self, key: &str, value: &[u8]) -> bool {
        self.try_put(key, value).unwrap_or(false)
    }

    /// Fallible variant returning the precondition error instead of
    /// collapsing it to `false`; `Storage::put` calls this and discards
    /// the `Err` case, per spec §7 (clean boolean return).
    pub fn try_put(&mut self, key: &str, value: &[u8]) -> Result<bool> {
        if let Some(&idx) = self.index.get(key) {
            return self.try_set_at(idx, value);
        }
        self.admit(key, value)
    }

    /// `PutIfAbsent(k, v)`: no-op-false on hit, admit-with-eviction on miss.
    pub fn put_if_absent(&mut self, key: &str, value: &[u8]) -> bool {
        if self.index.contains_key(key) {
            return false;
        }
        self.admit(key, value).unwrap_or(false)
    }

    /// `Set(k, v)`: replace the value for an existing key, evicting from
    /// the head to cover any size increase, and move the entry to the
    /// tail. Returns `false` if `key` is absent.
    pub fn set(&mut self, key: &str, value: &[u8]) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        self.try_set_at(idx, value).unwrap_or(false)
    }

    /// `Delete(k)`: remove the entry and its accounted bytes.
    pub fn delete(&mut self, key: &str) -> bool {
        let Some(idx) = self.index.remove(key) else {
            return false;
        };
        self.unlink(idx);
        let slot = self.arena.remove(idx);
        self.current_size -= slot.size();
        true
    }

    /// `Get(k, &mut v)`: copy the value out and move the entry to the
    /// tail. Mutates recency on a hit; this is the spec's documented
    /// design choice, not a bug.
    pub fn get(&mut self, key: &str, out: &mut Vec<u8>) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        out.clear();
        out.extend_from_slice(&self.arena.get(idx).value);
        self.touch(idx);
        true
    }

    // ── Internals ───────────────────────────────────────────────────

    fn admit(&mut self, key: &str, value: &[u8]) -> Result<bool> {
        let needed = key.len() + value.len();
        if needed > self.max_size {
            log::debug!(
                "cache-core: entry of {needed} bytes exceeds max_size {} for key {key:?}",
                self.max_size
            );
            return Err(CacheError::EntryTooLarge {
                needed,
                max_size: self.max_size,
            });
        }
        self.evict_until(needed, None);
        let idx = self.arena.insert(Slot::new(key.to_string(), value.to_vec()));
        self.index.insert(key.to_string(), idx);
        self.current_size += needed;
        self.link_at_tail(idx);
        Ok(true)
    }

    fn try_set_at(&mut self, idx: usize, value: &[u8]) -> Result<bool> {
        let old_size = self.arena.get(idx).size();
        let new_value_len = value.len();
        let key_len = self.arena.get(idx).key.len();
        let new_size = key_len + new_value_len;
        if new_size > self.max_size {
            return Err(CacheError::EntryTooLarge {
                needed: new_size,
                max_size: self.max_size,
            });
        }

        // Evict to cover the size delta, but never the entry we're
        // updating — it already owns its slot, we only need to free the
        // increase (spec §4.1: "eviction never touches the entry being
        // admitted/updated").
        if new_size > old_size {
            self.evict_until(new_size - old_size, Some(idx));
        }

        self.current_size = self.current_size - old_size + new_size;
        self.arena.get_mut(idx).value = value.to_vec();
        self.touch(idx);
        Ok(true)
    }

    /// Evict from the head until `current_size + extra <= max_size`,
    /// never evicting `protect`.
    fn evict_until(&mut self, extra: usize, protect: Option<usize>) {
        while self.current_size + extra > self.max_size {
            let Some(victim) = self.head else {
                // Nothing left to evict and we still don't fit: the
                // caller already checked `needed <= max_size`, so this
                // can only happen if `protect` itself is the sole
                // remaining entry, which the arithmetic above accounts
                // for without eviction. Reaching here is an invariant
                // violation.
                unreachable!("cache-core: evict_until ran out of victims under max_size bound");
            };
            if Some(victim) == protect {
                break;
            }
            let key = self.arena.get(victim).key.clone();
            log::trace!("cache-core: evicting {key:?} to admit {extra} more bytes");
            self.delete(&key);
        }
    }

    /// Move `idx` to the tail without touching size accounting.
    fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.link_at_tail(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.arena.get(idx);
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.arena.get_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena.get_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let slot = self.arena.get_mut(idx);
        slot.prev = None;
        slot.next = None;
    }

    fn link_at_tail(&mut self, idx: usize) {
        let old_tail = self.tail;
        self.arena.get_mut(idx).prev = old_tail;
        self.arena.get_mut(idx).next = None;
        match old_tail {
            Some(t) => self.arena.get_mut(t).next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_string(cache: &mut LruCache, key: &str) -> Option<String> {
        let mut out = Vec::new();
        if cache.get(key, &mut out) {
            Some(String::from_utf8(out).unwrap())
        } else {
            None
        }
    }

    #[test]
    fn scenario_1_eviction_respects_recency() {
        // spec §8 concrete scenario 1.
        let mut cache = LruCache::new(8);
        assert!(cache.put("a", b"1"));
        assert!(cache.put("b", b"2"));
        assert!(cache.put("c", b"3"));

        assert_eq!(get_string(&mut cache, "a"), None);
        assert_eq!(get_string(&mut cache, "b"), Some("2".to_string()));

        assert!(cache.put("d", b"4"));

        assert_eq!(get_string(&mut cache, "c"), None);
        assert_eq!(get_string(&mut cache, "b"), Some("2".to_string()));
        assert_eq!(get_string(&mut cache, "d"), Some("4".to_string()));
        assert_eq!(cache.current_size(), 4);
    }

    #[test]
    fn scenario_3_set_hit_grows_without_eviction() {
        let mut cache = LruCache::new(4);
        assert!(cache.put("k", b"v"));
        assert_eq!(cache.current_size(), 2);
        // Grow to exactly max_size via a 3-byte value ("k" + "vvv" = 4).
        assert!(cache.set("k", b"vvv"));
        assert_eq!(cache.current_size(), 4);
        assert_eq!(get_string(&mut cache, "k"), Some("vvv".to_string()));
    }

    #[test]
    fn scenario_4_put_then_get() {
        let mut cache = LruCache::new(64);
        assert!(cache.put("k", b"vv"));
        assert_eq!(get_string(&mut cache, "k"), Some("vv".to_string()));
    }

    #[test]
    fn put_too_large_leaves_store_untouched() {
        let mut cache = LruCache::new(4);
        assert!(cache.put("x", b"1"));
        assert_eq!(cache.current_size(), 2);
        assert!(!cache.put("this-key-is-way-too-long", b"and-so-is-this-value"));
        assert_eq!(cache.current_size(), 2);
        assert_eq!(get_string(&mut cache, "x"), Some("1".to_string()));
    }

    #[test]
    fn put_if_absent_respects_existing_key() {
        let mut cache = LruCache::new(64);
        assert!(cache.put_if_absent("k", b"first"));
        assert!(!cache.put_if_absent("k", b"second"));
        assert_eq!(get_string(&mut cache, "k"), Some("first".to_string()));
    }

    #[test]
    fn set_on_absent_key_fails() {
        let mut cache = LruCache::new(64);
        assert!(!cache.set("missing", b"v"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn delete_on_absent_key_fails() {
        let mut cache = LruCache::new(64);
        assert!(!cache.delete("missing"));
    }

    #[test]
    fn put_on_same_key_does_not_duplicate() {
        let mut cache = LruCache::new(64);
        assert!(cache.put("k", b"a"));
        assert!(cache.put("k", b"bb"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 1 + 2);
    }

    #[test]
    fn eviction_is_strictly_head_first() {
        let mut cache = LruCache::new(3);
        assert!(cache.put("a", b"1")); // size 2
        assert!(cache.put("b", b"1")); // size 2, evicts a -> {b}
        assert_eq!(get_string(&mut cache, "a"), None);
        assert_eq!(get_string(&mut cache, "b"), Some("1".to_string()));
    }

    #[test]
    fn invariant_index_matches_list_after_mixed_ops() {
        let mut cache = LruCache::new(32);
        for i in 0..10 {
            cache.put(&format!("k{i}"), b"v");
        }
        cache.delete("k3");
        cache.get("k5", &mut Vec::new());
        cache.set("k7", b"vv");

        // current_size matches the sum of live entries.
        let mut total = 0usize;
        let mut idx = cache.head;
        let mut count = 0;
        while let Some(i) = idx {
            let slot = cache.arena.get(i);
            total += slot.size();
            idx = slot.next;
            count += 1;
        }
        assert_eq!(total, cache.current_size());
        assert_eq!(count, cache.index.len());
        assert_eq!(cache.arena.len(), cache.index.len());
    }
}
