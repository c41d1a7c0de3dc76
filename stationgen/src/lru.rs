//! Capacity-bounded least-recently-used memo tables.

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use hashbrown::HashMap;

/// Single-threaded LRU map.
///
/// Recency is tracked with a queue of `(key, stamp)` records; a record is stale if the
/// entry has since been touched with a newer stamp. Stale records are skipped during
/// eviction and dropped in bulk when the queue grows too long, so every operation is
/// amortized O(1).
pub(crate) struct Lru<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
    recency: VecDeque<(K, u64)>,
    clock: u64,
}

impl<K: Clone + Eq + Hash, V: Clone> Lru<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            recency: VecDeque::new(),
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let stamp = self.tick();
        let (value, entry_stamp) = self.entries.get_mut(key)?;
        *entry_stamp = stamp;
        let value = value.clone();
        self.recency.push_back((key.clone(), stamp));
        self.compact_if_needed();
        Some(value)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let stamp = self.tick();
        self.entries.insert(key.clone(), (value, stamp));
        self.recency.push_back((key, stamp));
        while self.entries.len() > self.capacity {
            let Some((old_key, old_stamp)) = self.recency.pop_front() else {
                break;
            };
            if self
                .entries
                .get(&old_key)
                .is_some_and(|&(_, current)| current == old_stamp)
            {
                self.entries.remove(&old_key);
            }
        }
        self.compact_if_needed();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn compact_if_needed(&mut self) {
        if self.recency.len() <= self.capacity.saturating_mul(2) + 16 {
            return;
        }
        let entries = &self.entries;
        self.recency
            .retain(|(key, stamp)| entries.get(key).is_some_and(|&(_, s)| s == *stamp));
    }
}

/// Hit/miss counters of a cache.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct CacheStats {
    /// Number of lookups which found an entry.
    pub hits: u64,
    /// Number of lookups which had to compute the value.
    pub misses: u64,
    /// Number of entries currently held.
    pub len: usize,
}

/// Thread-safe LRU memo table for pure functions of the key.
///
/// The lock is not held while computing a missing value, so two threads may compute the
/// same entry concurrently; the last one to finish wins, which is harmless because both
/// computed the same value.
pub(crate) struct SharedLru<K, V> {
    inner: Mutex<Lru<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Clone + Eq + Hash, V: Clone> SharedLru<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Lru::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        self.lock().insert(key, value.clone());
        value
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.lock().len(),
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Lru<K, V>> {
        // The table holds no invariants a panic could break beyond losing entries.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> fmt::Debug for SharedLru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLru")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
