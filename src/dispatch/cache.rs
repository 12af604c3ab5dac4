// Per-factory store of reusable transport clients.

use crate::config::{ClientCacheConfig, EvictionOrder};
use crate::core::DestinationType;
use crate::dispatch::DispatchError;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Caches transport clients by addressing key.
///
/// Concurrent misses on the same key are coalesced, so a burst of publishes to
/// a new target builds one client. Construction errors are never cached.
pub struct ClientCache<C> {
    destination_type: DestinationType,
    cache: Option<Cache<String, Arc<C>>>,
    constructions: AtomicU64,
}

impl<C: Send + Sync + 'static> ClientCache<C> {
    /// Creates a new `ClientCache`.
    ///
    /// # Arguments
    /// * `destination_type` - The destination the cached clients serve, used for logs and metrics.
    /// * `config` - Capacity, expiry and eviction policy. A disabled config builds on every call.
    pub fn new(destination_type: DestinationType, config: &ClientCacheConfig) -> Self {
        let cache = config.enabled.then(|| {
            let policy = match config.eviction {
                EvictionOrder::Lru => EvictionPolicy::lru(),
                EvictionOrder::TinyLfu => EvictionPolicy::tiny_lfu(),
            };
            let mut builder = Cache::builder()
                .max_capacity(config.max_capacity)
                .eviction_policy(policy);
            if let Some(ttl) = config.ttl_seconds {
                builder = builder.time_to_live(Duration::from_secs(ttl));
            }
            if let Some(idle) = config.idle_seconds {
                builder = builder.time_to_idle(Duration::from_secs(idle));
            }
            builder.build()
        });

        Self {
            destination_type,
            cache,
            constructions: AtomicU64::new(0),
        }
    }

    /// Returns the cached client for `key`, building it with `build` on a miss.
    pub async fn get_or_build<F>(&self, key: &str, build: F) -> Result<Arc<C>, DispatchError>
    where
        F: FnOnce() -> Result<C, DispatchError> + Send,
    {
        let Some(cache) = &self.cache else {
            return self.construct(key, build);
        };

        cache
            .try_get_with(key.to_owned(), async { self.construct(key, build) })
            .await
            .map_err(|e: Arc<DispatchError>| DispatchError::clone(&e))
    }

    /// Evicts the client for `key` so the next lookup builds a fresh one.
    pub async fn invalidate(&self, key: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(key).await;
            metrics::counter!("destination_client_evictions_total", "destination" => self.destination_type.as_str())
                .increment(1);
            debug!(destination = %self.destination_type, key, "Evicted transport client");
        }
    }

    /// Number of clients built since the cache was created.
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    fn construct<F>(&self, key: &str, build: F) -> Result<Arc<C>, DispatchError>
    where
        F: FnOnce() -> Result<C, DispatchError>,
    {
        let client = build()?;
        self.constructions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("destination_client_constructions_total", "destination" => self.destination_type.as_str())
            .increment(1);
        debug!(destination = %self.destination_type, key, "Constructed transport client");
        Ok(Arc::new(client))
    }
}
