//! Cache Module
//!
//! Provides in-memory caching with LRU eviction, lazy TTL expiration and
//! per-key change notification.

mod channel;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use channel::{Subscription, WatchChannel};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::Cache;
