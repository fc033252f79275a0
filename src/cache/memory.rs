use std::{
    collections::HashMap,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

/// Time-bounded in-process result cache. Entries older than `ttl` are
/// treated as absent and dropped on the next lookup.
#[derive(Debug)]
pub struct MemoryCache<K, V> {
    ttl: Duration,
    slots: HashMap<K, (Instant, Arc<V>)>,
}

impl<K: Eq + Hash, V> MemoryCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&mut self, key: &K) -> Option<Arc<V>> {
        let slot = self
            .slots
            .get(key)
            .map(|(stored_at, value)| (stored_at.elapsed() < self.ttl, value.clone()));
        match slot {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                self.slots.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&mut self, key: K, value: Arc<V>) {
        self.slots.insert(key, (Instant::now(), value));
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
