use super::{CacheKey, CacheStore, CacheValue};

use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Hard references kept to the most recent retrievals.
pub(super) const DEFAULT_HARD_ENTRIES: usize = 256;

/// Stores reclaimable handles in the delegate while pinning only the most
/// recently retrieved values.
///
/// An entry whose last hard reference has been dropped is reclaimed; a
/// later lookup treats it as absent.
pub struct WeakStore {
    delegate: Box<dyn CacheStore>,
    hard: Mutex<VecDeque<CacheValue>>,
    hard_capacity: usize,
}

struct WeakEntry(Weak<dyn Any + Send + Sync>);

impl WeakStore {
    pub fn new(delegate: Box<dyn CacheStore>, hard_capacity: usize) -> Self {
        Self {
            delegate,
            hard: Mutex::new(VecDeque::new()),
            hard_capacity: hard_capacity.max(1),
        }
    }

    fn pin(&self, value: &CacheValue) {
        let mut hard = self.hard.lock();
        hard.push_back(value.clone());
        while hard.len() > self.hard_capacity {
            hard.pop_front();
        }
    }
}

impl CacheStore for WeakStore {
    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let entry = self.delegate.get(key)?;
        let weak = entry.downcast_ref::<WeakEntry>()?;
        match weak.0.upgrade() {
            Some(value) => {
                self.pin(&value);
                Some(value)
            }
            None => None,
        }
    }

    fn put(&mut self, key: CacheKey, value: CacheValue) {
        self.pin(&value);
        let entry: CacheValue = Arc::new(WeakEntry(Arc::downgrade(&value)));
        self.delegate.put(key, entry);
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheValue> {
        self.delegate
            .remove(key)
            .and_then(|entry| entry.downcast_ref::<WeakEntry>().and_then(|w| w.0.upgrade()))
    }

    fn clear(&mut self) {
        self.hard.lock().clear();
        self.delegate.clear();
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }
}
