use super::{CacheKey, CacheValue, SyncCache};

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// The per-session staging buffer in front of one shared cache.
///
/// Writes stage locally and flush to the shared tier on commit; a pending
/// clear blanks reads for this session until the commit applies it.
pub struct TransactionalCache {
    cache: Arc<SyncCache>,
    clear_pending: bool,
    staged: IndexMap<CacheKey, CacheValue>,
}

impl TransactionalCache {
    pub fn new(cache: Arc<SyncCache>) -> Self {
        Self {
            cache,
            clear_pending: false,
            staged: IndexMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        if self.clear_pending {
            return None;
        }
        self.cache.get(key)
    }

    pub fn put(&mut self, key: CacheKey, value: CacheValue) {
        self.staged.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.clear_pending = true;
        self.staged.clear();
    }

    /// Flushes the staging buffer into the shared tier.
    pub fn commit(&mut self) {
        if self.clear_pending {
            self.cache.clear();
        }
        for (key, value) in self.staged.drain(..) {
            self.cache.put(key, value);
        }
        self.clear_pending = false;
    }

    /// Discards the staging buffer.
    pub fn rollback(&mut self) {
        self.staged.clear();
        self.clear_pending = false;
    }
}

/// Routes staged operations to the transactional wrapper of each shared
/// cache a session has touched.
#[derive(Default)]
pub struct TransactionalCacheManager {
    txns: HashMap<String, TransactionalCache>,
}

impl TransactionalCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn txn(&mut self, cache: &Arc<SyncCache>) -> &mut TransactionalCache {
        self.txns
            .entry(cache.id().to_string())
            .or_insert_with(|| TransactionalCache::new(cache.clone()))
    }

    pub fn get(&mut self, cache: &Arc<SyncCache>, key: &CacheKey) -> Option<CacheValue> {
        self.txn(cache).get(key)
    }

    pub fn put(&mut self, cache: &Arc<SyncCache>, key: CacheKey, value: CacheValue) {
        self.txn(cache).put(key, value);
    }

    pub fn clear(&mut self, cache: &Arc<SyncCache>) {
        self.txn(cache).clear();
    }

    pub fn commit(&mut self) {
        for txn in self.txns.values_mut() {
            txn.commit();
        }
    }

    pub fn rollback(&mut self) {
        for txn in self.txns.values_mut() {
            txn.rollback();
        }
    }
}
