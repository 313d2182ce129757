//! Read-through aggregate cache.
//!
//! `fetch` is the request-path entry point: look up, or compute, store,
//! and return. Every failure inside the cache layer degrades to a direct
//! computation (fail-open) unless the configuration says otherwise; the
//! cache never turns a computable request into an error and never serves
//! data it cannot deserialize.
//!
//! There is deliberately no cross-request locking: two concurrent misses
//! for the same key may both compute and both write. Last writer wins,
//! and both values were correct reads of some committed state, so the
//! only cost is bounded duplicate work.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use medley_core::{ComputeError, MedleyResult};

use crate::config::CacheConfig;
use crate::key::{self, ParamValue};
use crate::store::CacheStore;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including corrupt-payload recomputes).
    pub misses: u64,
    /// Number of fetches that bypassed the store entirely (encode
    /// failure or store outage in fail-open mode).
    pub fail_open: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fail_open: AtomicU64,
}

/// Read-through cache over derived aggregates.
///
/// The store is an injected capability, never ambient global state; two
/// caches over different stores are fully independent.
pub struct AggregateCache<S: CacheStore> {
    store: Arc<S>,
    config: CacheConfig,
    counters: Counters,
}

impl<S: CacheStore> AggregateCache<S> {
    /// Create a new cache over the given store.
    pub fn new(store: Arc<S>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            counters: Counters::default(),
        }
    }

    /// Create a new cache with default configuration.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, CacheConfig::default())
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Snapshot the usage counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fail_open: self.counters.fail_open.load(Ordering::Relaxed),
        }
    }

    /// Return the cached value for `(namespace, params)`, or compute,
    /// store and return it.
    ///
    /// `compute` must be idempotent and must not call `fetch` for the
    /// same key (no reentrant recursion), so a locking store backend can
    /// never self-deadlock. Compute errors propagate unchanged; nothing
    /// partial is ever written.
    pub async fn fetch<T, F, Fut>(
        &self,
        namespace: &str,
        params: &[ParamValue],
        compute: F,
    ) -> MedleyResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = MedleyResult<T>>,
    {
        let cache_key = match key::encode(namespace, params) {
            Ok(cache_key) => cache_key,
            Err(err) => {
                // Unencodable parameters are always fail-open: compute,
                // return, and skip the cache entirely.
                warn!(namespace, error = %err, "uncacheable parameters, computing directly");
                self.counters.fail_open.fetch_add(1, Ordering::Relaxed);
                return self.run_compute(compute).await;
            }
        };

        match self.store.get(&cache_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %cache_key, "cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    // Treat as a miss and overwrite below.
                    warn!(key = %cache_key, error = %err, "corrupt cache payload, recomputing");
                }
            },
            Ok(None) => {}
            Err(err) => {
                if self.config.fail_closed {
                    return Err(err);
                }
                warn!(key = %cache_key, error = %err, "cache store unreachable, computing directly");
                self.counters.fail_open.fetch_add(1, Ordering::Relaxed);
                return self.run_compute(compute).await;
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let value = self.run_compute(compute).await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                let ttl = self.config.ttl_for(namespace);
                if let Err(err) = self.store.set(&cache_key, bytes, ttl).await {
                    warn!(key = %cache_key, error = %err, "cache write failed, returning computed value");
                }
            }
            Err(err) => {
                warn!(key = %cache_key, error = %err, "cache serialization failed, returning computed value");
            }
        }
        Ok(value)
    }

    /// Serialize `value` and store it under `(namespace, params)` with
    /// the namespace TTL. The background worker's direct-write path.
    pub async fn write_through<T: Serialize>(
        &self,
        namespace: &str,
        params: &[ParamValue],
        value: &T,
    ) -> MedleyResult<()> {
        let cache_key = key::encode(namespace, params)?;
        let bytes = serde_json::to_vec(value).map_err(|err| medley_core::StoreError::Codec {
            key: cache_key.clone(),
            reason: err.to_string(),
        })?;
        let ttl = self.config.ttl_for(namespace);
        self.store.set(&cache_key, bytes, ttl).await
    }

    /// Remove one exact entry. No-op if absent.
    pub async fn delete(&self, namespace: &str, params: &[ParamValue]) -> MedleyResult<bool> {
        let cache_key = key::encode(namespace, params)?;
        self.store.delete(&cache_key).await
    }

    /// Remove every entry in a namespace. Used when invalidation is
    /// coarse and no specific key is known.
    pub async fn delete_prefix(&self, namespace: &str) -> MedleyResult<u64> {
        let prefix = key::key_prefix(namespace)?;
        self.store.delete_prefix(&prefix).await
    }

    /// Administrative: remove every entry in every namespace.
    pub async fn clear_all(&self) -> MedleyResult<()> {
        self.store.clear().await
    }

    async fn run_compute<T, F, Fut>(&self, compute: F) -> MedleyResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MedleyResult<T>>,
    {
        match self.config.compute_timeout {
            Some(limit) => match tokio::time::timeout(limit, compute()).await {
                Ok(result) => result,
                Err(_) => Err(ComputeError::Timeout {
                    elapsed_ms: limit.as_millis() as u64,
                }
                .into()),
            },
            None => compute().await,
        }
    }
}
