//! Integration Tests for the public cache API
//!
//! Exercises eviction, expiry and observation across threads and tasks.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tokio_stream::StreamExt;
use watch_cache::{Cache, Config, Subscription, TryRecvError};

// == Helper Functions ==

fn drain<V>(sub: &mut Subscription<V>) -> Vec<Option<V>> {
    let mut values = Vec::new();
    while let Ok(value) = sub.try_recv() {
        values.push(value);
    }
    values
}

// == Eviction Scenarios ==

#[test]
fn test_eviction_of_least_recently_put() {
    let cache = Cache::new(Some(2), None);

    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);

    assert_eq!(cache.get(&"a"), None);
    assert_eq!(cache.get(&"b"), Some(2));
    assert_eq!(cache.get(&"c"), Some(3));
}

#[test]
fn test_get_protects_from_eviction() {
    let cache = Cache::new(Some(2), None);

    cache.put("a", 1);
    cache.put("b", 2);
    cache.get(&"a");
    cache.put("c", 3);

    assert_eq!(cache.get(&"a"), Some(1));
    assert_eq!(cache.get(&"b"), None);
    assert_eq!(cache.get(&"c"), Some(3));
}

#[test]
fn test_eviction_notifies_observer() {
    let cache = Cache::new(Some(2), None);
    let mut sub = cache.observe("a");

    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);

    assert_eq!(drain(&mut sub), vec![None, Some(1), None]);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_from_config() {
    let cache: Cache<String, u32> = Cache::from_config(&Config {
        max_size: Some(0),
        expires_after: None,
    });
    assert_eq!(cache.max_size(), 500);
}

// == Expiry Scenarios ==

#[tokio::test(start_paused = true)]
async fn test_expiry_discovered_by_get_notifies_observer() {
    let cache = Cache::new(None, Some(Duration::from_millis(100)));
    cache.put("session", "token");
    let mut sub = cache.observe("session");

    tokio::time::advance(Duration::from_millis(100)).await;
    // Nothing is emitted until an operation notices the expiry.
    assert_eq!(drain(&mut sub), vec![Some("token")]);

    assert_eq!(cache.get(&"session"), None);
    assert_eq!(sub.try_recv(), Ok(None));
    assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test(start_paused = true)]
async fn test_all_items_expiry_is_visible_to_get() {
    let cache = Cache::new(None, Some(Duration::from_secs(1)));
    cache.put("a", 1);
    cache.put("b", 2);
    let mut sub = cache.observe("a");

    tokio::time::advance(Duration::from_millis(500)).await;
    cache.put("b", 3);
    tokio::time::advance(Duration::from_millis(500)).await;

    let items = cache.all_items();
    assert!(!items.contains_key("a"));
    assert_eq!(items.get("b"), Some(&3));
    assert_eq!(drain(&mut sub), vec![Some(1), None]);
    assert_eq!(cache.get(&"a"), None);
    assert_eq!(cache.stats().expirations, 1);
}

// == Clear ==

#[test]
fn test_clear_notifies_each_observer_once() {
    let cache = Cache::default();
    for key in 0..10 {
        cache.put(key, key * 10);
    }
    let mut subs: Vec<_> = (0..10).map(|key| cache.observe(key)).collect();

    cache.clear();

    for (key, sub) in subs.iter_mut().enumerate() {
        assert_eq!(drain(sub), vec![Some(key * 10), None]);
        assert_eq!(cache.get(&key), None);
    }
    assert!(cache.is_empty());
}

// == Concurrency ==

#[test]
fn test_concurrent_puts_same_key() {
    const THREADS: usize = 16;
    let cache = Arc::new(Cache::new(Some(4), None));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.put("shared", i);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let value = cache.get(&"shared").unwrap();
    assert!(value < THREADS);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_concurrent_puts_respect_capacity() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 200;
    let cache = Arc::new(Cache::new(Some(50), None));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    cache.put(t * PER_THREAD + i, i);
                    cache.get(&(t * PER_THREAD + i / 2));
                    assert!(cache.len() <= 50);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 50);
    assert_eq!(cache.all_items().len(), 50);
    assert_eq!(cache.stats().evictions, (THREADS * PER_THREAD - 50) as u64);
}

#[test]
fn test_last_emission_matches_final_value() {
    const THREADS: usize = 8;
    let cache = Arc::new(Cache::default());
    let mut sub = cache.observe("k");

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for round in 0..50 {
                    cache.put("k", i * 100 + round);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let values = drain(&mut sub);
    assert_eq!(values.len(), 1 + THREADS * 50);
    assert_eq!(values[0], None);
    assert_eq!(*values.last().unwrap(), cache.get(&"k"));

    // Each writer's own puts arrive in the order it made them.
    for i in 0..THREADS {
        let mine: Vec<usize> = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v / 100 == i)
            .collect();
        assert_eq!(mine, (0..50).map(|round| i * 100 + round).collect::<Vec<_>>());
    }
}

#[test]
fn test_subscribers_on_other_threads_see_same_sequence() {
    let cache = Arc::new(Cache::default());
    cache.put("k", 0);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let mut sub = cache.observe("k");
            thread::spawn(move || (0..=20).map(|_| sub.blocking_recv()).collect::<Vec<_>>())
        })
        .collect();

    for value in 1..=20 {
        cache.put("k", value);
    }

    let expected: Vec<Option<i32>> = (0..=20).map(Some).collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), expected);
    }
}

#[test]
fn test_observer_may_call_back_into_cache() {
    let cache = Arc::new(Cache::default());
    let mut sub = cache.observe("source");

    let mirror = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for _ in 0..3 {
                if let Some(value) = sub.blocking_recv() {
                    cache.put("mirror", value);
                }
            }
        })
    };

    cache.put("source", 1);
    cache.put("source", 2);
    mirror.join().unwrap();

    assert_eq!(cache.get(&"mirror"), Some(2));
}

#[test]
fn test_subscribe_and_drop_while_publishing() {
    let cache = Arc::new(Cache::default());

    let churn: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..200 {
                    let mut sub = cache.observe("hot");
                    assert!(sub.try_recv().is_ok());
                }
            })
        })
        .collect();

    for i in 0..500 {
        cache.put("hot", i);
        if i % 50 == 0 {
            cache.remove(&"hot");
        }
    }
    for handle in churn {
        handle.join().unwrap();
    }

    assert_eq!(cache.observer_count(&"hot"), 0);
    assert_eq!(cache.get(&"hot"), Some(499));
}

// == Stream Composition ==

#[tokio::test]
async fn test_subscription_composes_as_stream() {
    let cache = Cache::default();
    let sub = cache.observe("count".to_string());

    cache.put("count".to_string(), 1);
    cache.put("count".to_string(), 2);
    cache.remove("count");
    cache.put("count".to_string(), 3);

    let present: Vec<i32> = sub.take(5).filter_map(|value| value).collect().await;
    assert_eq!(present, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_recv_waits_for_put_from_another_task() {
    let cache = Arc::new(Cache::default());
    let mut sub = cache.observe("late");
    assert_eq!(sub.recv().await, None);

    let writer = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.put("late", "arrived");
        })
    };

    assert_eq!(sub.recv().await, Some("arrived"));
    writer.await.unwrap();
}
