//! Cache Module
//!
//! Request-level cache in front of the document store: backend contract,
//! in-memory store with TTL expiration and LRU eviction, and a no-op backend.

mod backend;
mod entry;
mod lru;
mod pattern;
mod stats;
mod store;


// Re-export public types
pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use pattern::glob_match;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
