//! Watch Cache demo
//!
//! Builds a cache from environment configuration, observes one key from a
//! background task and prints what the observer sees.

use std::time::Duration;

use anyhow::Context;
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watch_cache::{Cache, Config};

/// Key followed by the observer task.
const WATCHED_KEY: &str = "greeting";

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and observe one key from a spawned task
/// 4. Put, overwrite, evict and remove the watched key
/// 5. Print the final statistics as JSON
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watch_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Watch Cache demo");

    let config = Config::from_env();
    let cache = Cache::<String, String>::from_config(&config);
    info!(
        "Cache initialized: max_size={}, expires_after={:?}",
        cache.max_size(),
        cache.expires_after()
    );

    // Initial snapshot, two puts, eviction, re-put, remove.
    let expected = 6;
    let updates = cache.observe(WATCHED_KEY.to_string());
    let observer = tokio::spawn(async move {
        let mut updates = updates.take(expected);
        while let Some(value) = updates.next().await {
            match value {
                Some(value) => info!("{} = {:?}", WATCHED_KEY, value),
                None => info!("{} is absent", WATCHED_KEY),
            }
        }
    });

    cache.put(WATCHED_KEY.to_string(), "hello".to_string());
    cache.put(WATCHED_KEY.to_string(), "hello again".to_string());

    // Fill the cache past capacity so the watched key is evicted.
    for i in 0..cache.max_size() {
        cache.put(format!("filler-{}", i), i.to_string());
    }

    cache.put(WATCHED_KEY.to_string(), "back".to_string());
    cache.remove(WATCHED_KEY);

    tokio::time::timeout(Duration::from_secs(5), observer)
        .await
        .context("observer did not receive every update")?
        .context("observer task failed")?;

    let stats = serde_json::to_string_pretty(&cache.stats())?;
    println!("{}", stats);

    info!("Demo complete");
    Ok(())
}
