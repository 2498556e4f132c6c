use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Bounded map with least-recently-used eviction.
///
/// Every entry carries a monotonically increasing tick; `order` maps ticks back to keys
/// so the oldest entry is always the first element of the `BTreeMap`.
#[derive(Debug, Clone)]
pub struct Lru<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K, V> Lru<K, V>
where
    K: Eq + Hash + Clone,
{
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            tick: 0,
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

    /// Membership test; does not refresh recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Look up a value and mark it most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let tick = self.next_tick();
        let (value, stamp) = self.entries.get_mut(key)?;
        if let Some(owned) = self.order.remove(&*stamp) {
            self.order.insert(tick, owned);
        }
        *stamp = tick;
        Some(value)
    }

    /// Insert or replace a value, evicting the least recently used entry when full.
    /// Returns the evicted key, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        let tick = self.next_tick();

        if let Some((slot, stamp)) = self.entries.get_mut(&key) {
            *slot = value;
            self.order.remove(&*stamp);
            *stamp = tick;
            self.order.insert(tick, key);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.pop_oldest()
        } else {
            None
        };

        self.order.insert(tick, key.clone());
        self.entries.insert(key, (value, tick));
        evicted
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let (value, stamp) = self.entries.remove(key)?;
        self.order.remove(&stamp);
        Some(value)
    }

    /// Remove every entry whose key matches the predicate
    pub fn retain_keys<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let doomed: Vec<u64> = self
            .order
            .iter()
            .filter(|&(_, key)| !keep(key))
            .map(|(stamp, _)| *stamp)
            .collect();

        for stamp in &doomed {
            if let Some(key) = self.order.remove(stamp) {
                self.entries.remove(&key);
            }
        }
        doomed.len()
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn pop_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
