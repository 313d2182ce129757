//! In-memory cache store over a sorted keyspace.
//!
//! Backs development and tests, and doubles as the reference semantics
//! for any external backend: per-key atomicity, TTL expiry, prefix
//! deletion via range scan over the sorted keys.

use async_trait::async_trait;
use chrono::Utc;
use medley_core::{MedleyResult, Timestamp};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::store::CacheStore;

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: Timestamp,
}

impl StoredEntry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// In-memory [`CacheStore`] implementation.
///
/// Uses a `BTreeMap` so keys are sorted and `delete_prefix` is a single
/// range scan. Expired entries are invisible to reads and swept on
/// writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, StoredEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries. Test helper.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// True if the store holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn sweep_expired(entries: &mut BTreeMap<String, StoredEntry>, now: Timestamp) {
        entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> MedleyResult<Option<Vec<u8>>> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> MedleyResult<()> {
        let now = Utc::now();
        // Saturate absurd TTLs instead of overflowing the timestamp.
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        let mut entries = self.entries.write().await;
        Self::sweep_expired(&mut entries, now);
        entries.insert(key.to_string(), StoredEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> MedleyResult<bool> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn delete_prefix(&self, prefix: &str) -> MedleyResult<u64> {
        let mut entries = self.entries.write().await;
        let doomed: Vec<String> = entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        let count = doomed.len() as u64;
        for key in doomed {
            entries.remove(&key);
        }
        Ok(count)
    }

    async fn clear(&self) -> MedleyResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
