//! Bounded least-recently-used cache.
//!
//! Entries live in a slab of nodes threaded into a doubly linked list ordered by
//! recency (most recent at the head); a hash index maps keys to slab slots so
//! `contains`, `get` and `insert` are all O(1). Freed slots are reused and
//! storage grows with use, so the capacity is only an upper bound.
//!
//! Not thread-safe on its own; callers wrap it in a lock.

use std::{borrow::Borrow, collections::HashMap, hash::Hash};

const PREALLOCATE_LIMIT: usize = 64;

struct Node<K, V> {
    entry: Option<(K, V)>,
    prev: Option<usize>,
    next: Option<usize>,
}

pub struct LruCache<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let reserve = capacity.min(PREALLOCATE_LIMIT);
        Self {
            capacity,
            index: HashMap::with_capacity(reserve),
            nodes: Vec::with_capacity(reserve),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Existence check; does not touch recency order.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Look up `key` and promote it to most-recently-used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Insert `value` under `key` at the most-recently-used position.
    ///
    /// An existing key only has its recency refreshed; the stored value is kept
    /// and `value` is dropped. Inserting a new key into a full cache evicts the
    /// least-recently-used entry first, which is handed back to the caller.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            self.move_to_front(idx);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let node = Node {
            entry: Some((key.clone(), value)),
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.push_front(idx);
        self.index.insert(key, idx);
        evicted
    }

    /// Remove and return the least-recently-used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        self.unlink(idx);
        let (key, value) = self.nodes[idx].entry.take()?;
        self.index.remove(&key);
        self.free.push(idx);
        Some((key, value))
    }

    /// Remove every entry, least-recently-used first.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(entry) = self.pop_lru() {
            out.push(entry);
        }
        self.nodes.clear();
        self.free.clear();
        out
    }

    /// Keys ordered from most- to least-recently-used.
    #[cfg(test)]
    fn keys(&self) -> impl Iterator<Item = &K> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let idx = cursor?;
            let node = &self.nodes[idx];
            cursor = node.next;
            node.entry.as_ref().map(|(k, _)| k)
        })
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = &self.nodes[idx];
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[idx];
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[idx];
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.nodes[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_of(cache: &LruCache<String, u32>) -> Vec<&str> {
        cache.keys().map(String::as_str).collect()
    }

    #[test]
    fn evicts_least_recently_inserted_without_access() {
        let mut cache = LruCache::new(2);
        assert!(cache.insert("a".to_string(), 1).is_none());
        assert!(cache.insert("b".to_string(), 2).is_none());
        let evicted = cache.insert("c".to_string(), 3);
        assert_eq!(evicted, Some(("a".to_string(), 1)));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
    }

    #[test]
    fn get_promotes_entry() {
        let mut cache = LruCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.get("a"), Some(&1));
        let evicted = cache.insert("c".to_string(), 3);
        assert_eq!(evicted, Some(("b".to_string(), 2)));
        assert_eq!(keys_of(&cache), vec!["c", "a"]);
    }

    #[test]
    fn contains_does_not_promote() {
        let mut cache = LruCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert!(cache.contains("a"));
        let evicted = cache.insert("c".to_string(), 3);
        assert_eq!(evicted.map(|(k, _)| k), Some("a".to_string()));
    }

    #[test]
    fn reinsert_keeps_original_value_and_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert!(cache.insert("a".to_string(), 100).is_none());
        assert_eq!(keys_of(&cache), vec!["a", "b"]);
        assert_eq!(cache.get("a"), Some(&1));
    }

    #[test]
    fn missing_key_returns_none() {
        let mut cache: LruCache<String, u32> = LruCache::new(1);
        assert!(cache.get("nope").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("a".to_string(), 1);
        let evicted = cache.insert("b".to_string(), 2);
        assert_eq!(evicted, Some(("a".to_string(), 1)));
    }

    #[test]
    fn unbounded_capacity_allocates_on_demand() {
        let mut cache = LruCache::new(usize::MAX);
        assert_eq!(cache.capacity(), usize::MAX);
        for i in 0..100u32 {
            assert!(cache.insert(format!("k{i}"), i).is_none());
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get("k0"), Some(&0));
        assert_eq!(cache.pop_lru(), Some(("k1".to_string(), 1)));
    }

    #[test]
    fn slots_are_reused_after_eviction() {
        let mut cache = LruCache::new(3);
        for i in 0..50u32 {
            cache.insert(format!("k{i}"), i);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.nodes.len() <= 3);
        assert_eq!(keys_of(&cache), vec!["k49", "k48", "k47"]);
    }

    #[test]
    fn drain_returns_lru_first() {
        let mut cache = LruCache::new(3);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("c".to_string(), 3);
        cache.get("a");
        let drained: Vec<String> = cache.drain().into_iter().map(|(k, _)| k).collect();
        assert_eq!(drained, vec!["b", "c", "a"]);
        assert!(cache.is_empty());
        assert!(cache.keys().next().is_none());
    }
}
