//! Cache store trait for pluggable backends.
//!
//! The store is the only shared mutable resource in the cache layer. It
//! is assumed to provide per-key atomicity but no cross-key transactions,
//! and to enforce TTL expiry on its own entries.

use async_trait::async_trait;
use medley_core::MedleyResult;
use std::time::Duration;

/// Cache backend abstraction.
///
/// Implementations must be thread-safe and support concurrent access.
/// Keys are the opaque strings produced by [`crate::key::encode`];
/// because every key starts with `namespace/`, a backend with a sorted
/// keyspace (or native prefix delete) satisfies `delete_prefix` without
/// any secondary index.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value. Expired entries are absent.
    async fn get(&self, key: &str) -> MedleyResult<Option<Vec<u8>>>;

    /// Set a value with a TTL. Overwrites any existing entry (last write
    /// wins).
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> MedleyResult<()>;

    /// Delete one entry. Returns whether a live entry was removed;
    /// deleting an absent key is a successful no-op.
    async fn delete(&self, key: &str) -> MedleyResult<bool>;

    /// Delete every entry whose key starts with `prefix`. Returns the
    /// number of entries removed.
    async fn delete_prefix(&self, prefix: &str) -> MedleyResult<u64>;

    /// Remove every entry. Administrative.
    async fn clear(&self) -> MedleyResult<()>;
}
