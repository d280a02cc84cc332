use super::{CacheKey, CacheStore, CacheValue};

use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Bounded access-ordered eviction.
///
/// The key tracker is a bounded access-ordered map; storage stays in the
/// delegate. Reads refresh recency through the tracker's own lock so the
/// outer synchronization wrapper can keep handing out shared read locks.
pub struct LruStore {
    delegate: Box<dyn CacheStore>,
    keys: Mutex<lru::LruCache<CacheKey, ()>>,
}

impl LruStore {
    pub fn new(delegate: Box<dyn CacheStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least one");
        Self {
            delegate,
            keys: Mutex::new(lru::LruCache::new(capacity)),
        }
    }
}

impl CacheStore for LruStore {
    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.keys.lock().get(key);
        self.delegate.get(key)
    }

    fn put(&mut self, key: CacheKey, value: CacheValue) {
        let evicted = self.keys.lock().push(key.clone(), ());
        self.delegate.put(key.clone(), value);
        if let Some((old, ())) = evicted {
            if old != key {
                self.delegate.remove(&old);
            }
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheValue> {
        self.keys.lock().pop(key);
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.keys.lock().clear();
        self.delegate.clear();
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }
}
