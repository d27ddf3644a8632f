//! Watch Cache - a thread-safe in-memory cache
//!
//! Combines LRU eviction, lazy TTL expiration and per-key change
//! notification behind a single lock.
//!
//! ```
//! use watch_cache::Cache;
//!
//! let cache = Cache::new(Some(2), None);
//! let mut updates = cache.observe("a");
//!
//! cache.put("a", 1);
//! cache.put("b", 2);
//! cache.put("c", 3);
//!
//! assert_eq!(cache.get(&"a"), None);
//! assert_eq!(updates.try_recv(), Ok(None));
//! assert_eq!(updates.try_recv(), Ok(Some(1)));
//! assert_eq!(updates.try_recv(), Ok(None));
//! ```

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Cache, CacheStats, Subscription};
pub use config::Config;
pub use error::{ConfigError, TryRecvError};
