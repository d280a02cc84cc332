use super::{CacheKey, CacheStore, CacheValue};

use parking_lot::RwLock;
use std::fmt;

/// The outermost decorator: reads take a shared lock, writes an exclusive
/// one. Every shared cache handed to sessions is wrapped in this.
pub struct SyncCache {
    id: String,
    read_only: bool,
    store: RwLock<Box<dyn CacheStore>>,
}

impl SyncCache {
    pub fn new(id: impl Into<String>, read_only: bool, store: Box<dyn CacheStore>) -> Self {
        Self {
            id: id.into(),
            read_only,
            store: RwLock::new(store),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// When false, readers receive deep copies rather than the shared
    /// instance.
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.store.read().get(key)
    }

    pub fn put(&self, key: CacheKey, value: CacheValue) {
        self.store.write().put(key, value);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheValue> {
        self.store.write().remove(key)
    }

    pub fn clear(&self) {
        self.store.write().clear();
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }
}

impl fmt::Debug for SyncCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCache")
            .field("id", &self.id)
            .field("read_only", &self.read_only)
            .field("len", &self.len())
            .finish()
    }
}
