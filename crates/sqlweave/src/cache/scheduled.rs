use super::{CacheKey, CacheStore, CacheValue};

use std::time::{Duration, Instant};

/// Timed flush: once the interval elapses, the next write empties the
/// tier and reads treat entries as absent until then.
pub struct ScheduledStore {
    delegate: Box<dyn CacheStore>,
    interval: Duration,
    last_clear: Instant,
}

impl ScheduledStore {
    pub fn new(delegate: Box<dyn CacheStore>, interval: Duration) -> Self {
        Self {
            delegate,
            interval,
            last_clear: Instant::now(),
        }
    }

    fn stale(&self) -> bool {
        self.last_clear.elapsed() >= self.interval
    }

    fn flush_if_stale(&mut self) {
        if self.stale() {
            self.delegate.clear();
            self.last_clear = Instant::now();
        }
    }
}

impl CacheStore for ScheduledStore {
    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        if self.stale() {
            return None;
        }
        self.delegate.get(key)
    }

    fn put(&mut self, key: CacheKey, value: CacheValue) {
        self.flush_if_stale();
        self.delegate.put(key, value);
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheValue> {
        self.flush_if_stale();
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.last_clear = Instant::now();
        self.delegate.clear();
    }

    fn len(&self) -> usize {
        if self.stale() {
            0
        } else {
            self.delegate.len()
        }
    }
}
