//! Cache Backends
//!
//! The contract the resolver uses to talk to a cache, with two implementations:
//! - [`MemoryCache`] - shared in-process [`CacheStore`]
//! - [`NullCache`] - no-op cache, every lookup misses (store-only mode)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheStats, CacheStore};
use crate::error::CacheError;

// == Cache Backend Trait ==
/// Key/value cache with per-key expiration.
///
/// Each call is atomic on its own; no multi-key transactions are offered.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Value under `key`, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Keys matching the glob `pattern`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Values for `keys`, positionally aligned.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError>;

    /// Current counters.
    async fn stats(&self) -> CacheStats;
}

// == Memory Cache ==
/// In-process cache shared across request tasks.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<CacheStore>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self::from_store(CacheStore::new(max_entries))
    }

    pub fn from_store(store: CacheStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// Shared handle to the underlying store, for the cleanup task.
    pub fn store(&self) -> Arc<RwLock<CacheStore>> {
        Arc::clone(&self.store)
    }

    /// Remaining TTL of `key`.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        self.store.read().await.ttl(key)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        // write lock: LRU touch and stats update
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.store
            .write()
            .await
            .set(key.to_string(), value, Some(ttl))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        Ok(self.store.read().await.keys(pattern))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        Ok(self.store.write().await.mget(keys))
    }

    async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }
}

// == Null Cache ==
/// Cache that stores nothing. Used when caching is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, CacheError> {
        Ok(Vec::new())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        Ok(vec![None; keys.len()])
    }

    async fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
