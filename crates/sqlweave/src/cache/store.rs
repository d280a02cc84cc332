use super::{CacheKey, CacheStore, CacheValue};

use std::collections::HashMap;

/// The bottom of every chain: a plain unbounded map.
#[derive(Default)]
pub struct PerpetualStore {
    entries: HashMap<CacheKey, CacheValue>,
}

impl PerpetualStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for PerpetualStore {
    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value);
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheValue> {
        self.entries.remove(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
