//! Recent Keys
//!
//! Fixed-capacity set of the most recently inserted keys. The oldest key is
//! evicted when a new one arrives at capacity.
//!
//! Storage is a ring of slots plus a key -> slot index, so insert, lookup and
//! eviction are all O(1) and memory never grows past `capacity` entries.

use std::collections::HashMap;
use std::hash::Hash;

/// Bounded FIFO set of keys.
#[derive(Debug, Clone)]
pub struct RecentKeys<K> {
    ring: Vec<Option<K>>,
    next: usize,
    index: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash> RecentKeys<K> {
    /// Create a window remembering at most `capacity` keys.
    ///
    /// A capacity of zero remembers nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: vec![None; capacity],
            next: 0,
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Remember `key`. Returns `false` if it was already present.
    ///
    /// A key already present keeps its original position; it is not
    /// refreshed.
    pub fn insert(&mut self, key: K) -> bool {
        if self.ring.is_empty() {
            return true;
        }
        if self.index.contains_key(&key) {
            return false;
        }

        if let Some(evicted) = self.ring[self.next].take() {
            self.index.remove(&evicted);
        }
        self.ring[self.next] = Some(key);
        self.index.insert(key, self.next);
        self.next = (self.next + 1) % self.ring.len();
        true
    }

    /// Whether `key` is currently remembered.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Keys currently remembered.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// No keys remembered.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Maximum keys remembered.
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }
}
