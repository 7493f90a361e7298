use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Queue entries older than this many dead slots per live entry get compacted.
const COMPACT_RATIO: usize = 2;
const COMPACT_MIN: usize = 32;

struct Slot<V> {
    seq: u64,
    value: V,
}

/// Keyed container with a fixed capacity and strict FIFO eviction.
///
/// Values live in a map; insertion order lives in a separate queue of
/// `(seq, key)` pairs. Removing a key only drops the map slot, leaving a stale
/// queue entry that is skipped (its `seq` no longer matches) and swept out
/// once stale entries outnumber live ones. Updating an existing key never
/// touches the queue, so its eviction position is fixed at first insert.
pub struct BoundedTable<K, V> {
    capacity: usize,
    entries: HashMap<K, Slot<V>>,
    order: VecDeque<(u64, K)>,
    next_seq: u64,
}

impl<K, V> BoundedTable<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|slot| &mut slot.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or update `key`.
    ///
    /// Returns the entry evicted to make room, if any. With a capacity of zero
    /// nothing is admitted and the new entry itself is handed back.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.value = value;
            return None;
        }
        if self.capacity == 0 {
            return Some((key, value));
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((seq, key.clone()));
        self.entries.insert(key, Slot { seq, value });
        evicted
    }

    pub fn remove(&mut self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.maybe_compact();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Change the capacity, evicting the oldest entries if the table is over it.
    /// Returns the evicted entries, oldest first.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<(K, V)> {
        self.capacity = capacity;
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            match self.evict_oldest() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        evicted
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn keys_in_order(&self) -> Vec<K> {
        self.keys().cloned().collect()
    }

    /// Entries from oldest to newest insertion.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.order.iter().filter_map(move |(seq, key)| match self.entries.get(key) {
            Some(slot) if slot.seq == *seq => Some((key, &slot.value)),
            _ => None,
        })
    }

    /// Keep only the entries for which `keep` returns true. Returns how many were removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|k, slot| keep(k, &slot.value));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.maybe_compact();
        }
        removed
    }

    fn evict_oldest(&mut self) -> Option<(K, V)> {
        while let Some((seq, key)) = self.order.pop_front() {
            let live = matches!(self.entries.get(&key), Some(slot) if slot.seq == seq);
            if live {
                return self.entries.remove(&key).map(|slot| (key, slot.value));
            }
        }
        None
    }

    fn maybe_compact(&mut self) {
        let live = self.entries.len();
        if self.order.len() <= COMPACT_MIN.max(live * COMPACT_RATIO) {
            return;
        }
        let entries = &self.entries;
        self.order
            .retain(|(seq, key)| matches!(entries.get(key), Some(slot) if slot.seq == *seq));
    }
}

impl<K, V> std::fmt::Debug for BoundedTable<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
