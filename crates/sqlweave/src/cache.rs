//! The shared result cache: a single capability set {get, put, remove,
//! clear, len} composed through decorators, with the synchronization
//! wrapper outermost.
//!
//! Chain order: storage → eviction (LRU or FIFO) → timed flush
//! (optional) → synchronized wrapper. Cached values are opaque
//! (`Arc<dyn Any>`), which lets the weak-reference decorator store
//! reclaimable handles through the same delegate.

mod key;
pub use key::CacheKey;

mod store;
pub use store::PerpetualStore;

mod lru;
pub use lru::LruStore;

mod fifo;
pub use fifo::FifoStore;

mod scheduled;
pub use scheduled::ScheduledStore;

mod weak;
pub use weak::WeakStore;

mod sync;
pub use sync::SyncCache;

mod txn;
pub use txn::{TransactionalCache, TransactionalCacheManager};

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// The opaque value held by a cache tier.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Downcasts a cached value back to a result list.
pub fn as_results(value: &CacheValue) -> Option<Arc<Vec<sqlweave_core::Value>>> {
    value.clone().downcast::<Vec<sqlweave_core::Value>>().ok()
}

/// The single capability set every tier implements. Stores are not
/// thread-safe on their own; [`SyncCache`] wraps the outermost layer.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CacheValue>;

    fn put(&mut self, key: CacheKey, value: CacheValue);

    fn remove(&mut self, key: &CacheKey) -> Option<CacheValue>;

    fn clear(&mut self);

    fn len(&self) -> usize;
}

/// Eviction policy selected by the `<cache eviction>` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    Lru,
    Fifo,
    Weak,
}

impl Eviction {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "LRU" => Some(Self::Lru),
            "FIFO" => Some(Self::Fifo),
            // Rust has no soft references; both spellings degrade to the
            // weak decorator.
            "WEAK" | "SOFT" => Some(Self::Weak),
            _ => None,
        }
    }
}

/// Parsed `<cache>` attributes.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub eviction: Eviction,
    pub size: usize,
    pub flush_interval: Option<Duration>,
    pub read_only: bool,
    pub blocking: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction: Eviction::Lru,
            size: 1024,
            flush_interval: None,
            read_only: false,
            blocking: false,
        }
    }
}

/// Assembles the decorator chain for a namespace cache.
pub fn build_cache(id: impl Into<String>, config: &CacheConfig) -> Arc<SyncCache> {
    let storage: Box<dyn CacheStore> = Box::new(PerpetualStore::new());

    let evicting: Box<dyn CacheStore> = match config.eviction {
        Eviction::Lru => Box::new(LruStore::new(storage, config.size)),
        Eviction::Fifo => Box::new(FifoStore::new(storage, config.size)),
        Eviction::Weak => Box::new(WeakStore::new(storage, weak::DEFAULT_HARD_ENTRIES)),
    };

    let timed: Box<dyn CacheStore> = match config.flush_interval {
        Some(interval) => Box::new(ScheduledStore::new(evicting, interval)),
        None => evicting,
    };

    Arc::new(SyncCache::new(id, config.read_only, timed))
}
