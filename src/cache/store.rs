//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, lazy TTL
//! expiration and per-key change notification.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, LruTracker, Subscription, WatchChannel};
use crate::config::{Config, DEFAULT_MAX_SIZE};

/// Registry size below which idle channels are never swept.
const MIN_PRUNE_THRESHOLD: usize = 64;

// == Cache ==
/// Thread-safe cache with LRU eviction, lazy TTL expiry and per-key
/// observation.
///
/// Storage, recency order and the channel registry live behind a single
/// mutex. Emissions are queued while that lock is held, so each subscriber
/// sees a key's changes in the order the lock serialized them.
pub struct Cache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    max_size: usize,
    expires_after: Option<Duration>,
}

struct CacheInner<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Change channels by key
    channels: HashMap<K, Arc<WatchChannel<V>>>,
    /// Performance statistics
    stats: CacheStats,
    /// Registry size that triggers the next idle-channel sweep
    prune_at: usize,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a new cache.
    ///
    /// # Arguments
    /// * `max_size` - Maximum number of entries; None or zero means 500
    /// * `expires_after` - Entry lifetime after its latest put; None or zero
    ///   means entries never expire
    pub fn new(max_size: Option<usize>, expires_after: Option<Duration>) -> Self {
        let max_size = match max_size {
            Some(0) => {
                warn!("max_size must be positive, using default {}", DEFAULT_MAX_SIZE);
                DEFAULT_MAX_SIZE
            }
            Some(size) => size,
            None => DEFAULT_MAX_SIZE,
        };

        let expires_after = match expires_after {
            Some(ttl) if ttl.is_zero() => {
                warn!("expires_after must be positive, entries will not expire");
                None
            }
            ttl => ttl,
        };

        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                channels: HashMap::new(),
                stats: CacheStats::new(),
                prune_at: MIN_PRUNE_THRESHOLD,
            }),
            max_size,
            expires_after,
        }
    }

    /// Creates a cache from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_size, config.expires_after)
    }

    // == Put ==
    /// Stores a value, replacing any previous value and refreshing its TTL.
    ///
    /// The key becomes most recently used and its observers receive the new
    /// value. If the cache then holds more than `max_size` entries, the least
    /// recently used ones are evicted and their observers receive `None`.
    pub fn put(&self, key: K, value: V) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let entry = CacheEntry::new(value.clone(), self.expires_after, now);
        inner.entries.insert(key.clone(), entry);
        inner.lru.touch(&key);

        match inner.channels.entry(key) {
            Entry::Occupied(channel) => channel.get().publish(Some(value)),
            Entry::Vacant(slot) => {
                slot.insert(WatchChannel::new(Some(value)));
            }
        }

        let evicted = inner.evict_overflow(self.max_size);
        if evicted > 0 {
            debug!("LRU eviction: removed {} entries", evicted);
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// A hit makes the key most recently used. An expired entry is deleted,
    /// its observers receive `None`, and the lookup misses.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.expire_if_stale(key, now) {
            inner.stats.record_miss();
            return None;
        }

        let found = inner
            .entries
            .get_key_value(key)
            .map(|(stored_key, entry)| (stored_key.clone(), entry.value.clone()));
        let Some((stored_key, value)) = found else {
            inner.stats.record_miss();
            return None;
        };

        inner.lru.touch(&stored_key);
        inner.stats.record_hit();
        Some(value)
    }

    // == Remove ==
    /// Removes an entry by key. Removing an absent key is a no-op.
    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().delete(key);
    }

    // == Clear ==
    /// Removes every entry.
    ///
    /// Each observed key that still had a value receives exactly one `None`.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let cleared = inner.entries.len();

        inner.entries.clear();
        inner.lru.clear();
        inner.channels.retain(|_, channel| {
            if !channel.is_absent() {
                channel.publish(None);
            }
            channel.subscriber_count() > 0
        });

        debug!("Cache cleared: removed {} entries", cleared);
    }

    // == All Items ==
    /// Returns a snapshot of every unexpired entry.
    ///
    /// Expired entries found during the scan are deleted as in [`get`].
    /// Recency order is left untouched.
    ///
    /// [`get`]: Cache::get
    pub fn all_items(&self) -> HashMap<K, V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.expire(key);
        }

        inner
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    // == Observe ==
    /// Subscribes to the values of `key`.
    ///
    /// The subscription first yields the key's current value (`None` when
    /// absent or expired), then one item per put, remove, eviction,
    /// expiry or clear affecting the key.
    pub fn observe(&self, key: K) -> Subscription<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        inner.expire_if_stale(&key, now);

        if let Some(channel) = inner.channels.get(&key) {
            return channel.subscribe();
        }

        if inner.channels.len() >= inner.prune_at {
            inner.prune_idle_channels();
        }

        let snapshot = inner.entries.get(&key).map(|entry| entry.value.clone());
        let channel = WatchChannel::new(snapshot);
        let subscription = channel.subscribe();
        inner.channels.insert(key, channel);
        subscription
    }

    // == Time To Live ==
    /// Returns how long `key` has left before it expires.
    ///
    /// None when the key is absent or the cache has no TTL. An expired entry
    /// is deleted as in [`get`]. Recency order is left untouched.
    ///
    /// [`get`]: Cache::get
    pub fn time_to_live<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        inner.expire_if_stale(key, now);
        inner.entries.get(key)?.ttl_remaining(now)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    /// Number of live subscriptions for `key`.
    pub fn observer_count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .lock()
            .channels
            .get(key)
            .map_or(0, |channel| channel.subscriber_count())
    }

    // == Length ==
    /// Returns the number of stored entries, including expired entries not
    /// yet noticed.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Effective capacity after clamping.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Effective TTL after clamping.
    pub fn expires_after(&self) -> Option<Duration> {
        self.expires_after
    }

    #[cfg(test)]
    pub(crate) fn channel_count(&self) -> usize {
        self.inner.lock().channels.len()
    }

    #[cfg(test)]
    pub(crate) fn recency_len(&self) -> usize {
        self.inner.lock().lru.len()
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Deletes an entry and announces its absence. Returns false if the key
    /// was not stored.
    fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.entries.remove(key).is_none() {
            return false;
        }
        self.lru.remove(key);
        self.notify_absent(key);
        true
    }

    /// Deletes an entry found to be expired.
    fn expire<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.delete(key) {
            self.stats.record_expiration();
            debug!("Lazy expiry: removed expired entry");
        }
    }

    /// Expires the entry for `key` if its TTL has elapsed by `now`.
    fn expire_if_stale<Q>(&mut self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let stale = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if stale {
            self.expire(key);
        }
        stale
    }

    /// Forgets channels of absent keys that nobody observes anymore.
    ///
    /// The next sweep waits until the registry doubles again, keeping the
    /// cost amortized over the inserts that grew it.
    fn prune_idle_channels(&mut self) {
        let before = self.channels.len();
        let entries = &self.entries;
        self.channels
            .retain(|key, channel| entries.contains_key(key) || channel.subscriber_count() > 0);

        self.prune_at = (self.channels.len() * 2).max(MIN_PRUNE_THRESHOLD);
        debug!(
            "Channel sweep: dropped {} idle channels",
            before - self.channels.len()
        );
    }

    /// Evicts least recently used entries until at most `max_size` remain.
    fn evict_overflow(&mut self, max_size: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max_size {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            self.entries.remove(&oldest);
            self.notify_absent(&oldest);
            self.stats.record_eviction();
            evicted += 1;
        }
        evicted
    }

    /// Publishes absence for `key` and forgets its channel unless someone is
    /// still subscribed.
    fn notify_absent<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idle = match self.channels.get(key) {
            Some(channel) => {
                channel.publish(None);
                channel.subscriber_count() == 0
            }
            None => return,
        };
        if idle {
            self.channels.remove(key);
        }
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Cache")
            .field("len", &inner.entries.len())
            .field("max_size", &self.max_size)
            .field("expires_after", &self.expires_after)
            .field("channels", &inner.channels.len())
            .finish()
    }
}
