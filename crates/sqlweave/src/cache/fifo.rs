use super::{CacheKey, CacheStore, CacheValue};

use std::collections::VecDeque;

/// Bounded insertion-ordered eviction.
pub struct FifoStore {
    delegate: Box<dyn CacheStore>,
    queue: VecDeque<CacheKey>,
    capacity: usize,
}

impl FifoStore {
    pub fn new(delegate: Box<dyn CacheStore>, capacity: usize) -> Self {
        Self {
            delegate,
            queue: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }
}

impl CacheStore for FifoStore {
    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.delegate.get(key)
    }

    fn put(&mut self, key: CacheKey, value: CacheValue) {
        if !self.queue.contains(&key) {
            self.queue.push_back(key.clone());
            if self.queue.len() > self.capacity {
                if let Some(oldest) = self.queue.pop_front() {
                    self.delegate.remove(&oldest);
                }
            }
        }
        self.delegate.put(key, value);
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheValue> {
        self.queue.retain(|queued| queued != key);
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.delegate.clear();
    }

    fn len(&self) -> usize {
        self.delegate.len()
    }
}
