//! Change tracking and cache invalidation policy.
//!
//! One [`ChangeEvent`] in, zero or more cache deletions out. The policy
//! lives in [`ChangeTracker::plan`], a pure function over the event, so
//! it can be tested without a store; [`ChangeTracker::apply`] issues the
//! planned deletions and never raises into the mutation path that
//! triggered it - an unreachable store is logged and left to the
//! namespace TTL as the eventual-consistency backstop.
//!
//! Ordering contract: callers feed events only after the mutation has
//! durably committed (commit-then-invalidate). Invalidating earlier
//! would let a concurrent fetch repopulate the cache with pre-commit
//! rows that then never get re-invalidated.

use std::sync::Arc;
use tracing::{debug, warn};

use medley_core::{ChangeEvent, ChangeOp, EntityKind};

use crate::cache::AggregateCache;
use crate::key::ParamValue;
use crate::namespace;
use crate::store::CacheStore;

/// Fields of a time entry that feed the best-times aggregate. A change
/// to anything else (e.g. the coach note) invalidates nothing.
const ENTRY_AGGREGATE_FIELDS: &[&str] = &["seconds", "style", "member_id"];

/// Fields of a member that feed the roster aggregate.
const MEMBER_ROSTER_FIELDS: &[&str] = &["squad_id", "active", "name"];

/// One planned cache deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum Invalidation {
    /// Delete one exact entry.
    Key {
        namespace: &'static str,
        params: Vec<ParamValue>,
    },
    /// Delete every entry in a namespace.
    Prefix { namespace: &'static str },
}

impl Invalidation {
    fn key(namespace: &'static str, id: i64) -> Self {
        Self::Key {
            namespace,
            params: vec![ParamValue::Int(id)],
        }
    }
}

/// Turns committed-change events into cache deletions.
pub struct ChangeTracker<S: CacheStore> {
    cache: Arc<AggregateCache<S>>,
}

impl<S: CacheStore> ChangeTracker<S> {
    /// Create a tracker issuing deletions against the given cache.
    pub fn new(cache: Arc<AggregateCache<S>>) -> Self {
        Self { cache }
    }

    /// The invalidations required by one committed mutation.
    ///
    /// Pure policy; issues nothing. For an ownership reassignment (the
    /// owning foreign key itself changed) both the old and the new
    /// owner's aggregates are planned, because both row-sets changed.
    pub fn plan(event: &ChangeEvent) -> Vec<Invalidation> {
        match event.entity {
            EntityKind::TimeEntry => Self::plan_time_entry(event),
            EntityKind::Member => Self::plan_member(event),
        }
    }

    /// Apply the planned invalidations for one event. Returns the number
    /// of invalidations issued. Store failures are logged, never raised.
    pub async fn apply(&self, event: &ChangeEvent) -> usize {
        let planned = Self::plan(event);
        for invalidation in &planned {
            let outcome = match invalidation {
                Invalidation::Key { namespace, params } => {
                    self.cache.delete(namespace, params).await.map(|_| ())
                }
                Invalidation::Prefix { namespace } => {
                    self.cache.delete_prefix(namespace).await.map(|_| ())
                }
            };
            if let Err(err) = outcome {
                warn!(
                    entity = %event.entity,
                    entity_id = event.entity_id,
                    error = %err,
                    "cache invalidation failed, namespace TTL is the backstop"
                );
            }
        }
        debug!(
            entity = %event.entity,
            entity_id = event.entity_id,
            op = ?event.op,
            count = planned.len(),
            "processed change event"
        );
        planned.len()
    }

    fn plan_time_entry(event: &ChangeEvent) -> Vec<Invalidation> {
        if !Self::touches(event, ENTRY_AGGREGATE_FIELDS) {
            return Vec::new();
        }

        let mut planned: Vec<Invalidation> = Self::owner_ids(event, "member_id")
            .into_iter()
            .map(|owner| Invalidation::key(namespace::BEST_TIMES, owner))
            .collect();

        // Reports aggregate over all entries and are keyed arbitrarily,
        // so any contributing change clears the whole namespace.
        planned.push(Invalidation::Prefix {
            namespace: namespace::REPORTS,
        });
        planned
    }

    fn plan_member(event: &ChangeEvent) -> Vec<Invalidation> {
        if !Self::touches(event, MEMBER_ROSTER_FIELDS) {
            return Vec::new();
        }

        let mut planned: Vec<Invalidation> = Self::owner_ids(event, "squad_id")
            .into_iter()
            .map(|squad| Invalidation::key(namespace::MEMBER_ROSTER, squad))
            .collect();

        if event.op == ChangeOp::Destroy {
            // The member's own aggregate dies with the row.
            planned.push(Invalidation::key(namespace::BEST_TIMES, event.entity_id));
        }
        planned
    }

    /// Whether the event affects any of the listed aggregate fields.
    /// Creates and destroys always do; updates only when one of the
    /// fields actually changed.
    fn touches(event: &ChangeEvent, fields: &[&str]) -> bool {
        match event.op {
            ChangeOp::Create | ChangeOp::Destroy => true,
            ChangeOp::Update => event.any_changed(fields),
        }
    }

    /// The owner ids named by the event's foreign-key field: one id in
    /// the common case, two when the key was reassigned (old and new
    /// owner), none when the event does not carry the field.
    fn owner_ids(event: &ChangeEvent, fk_field: &str) -> Vec<i64> {
        let Some(diff) = event.field(fk_field) else {
            return Vec::new();
        };
        let mut ids = Vec::with_capacity(2);
        if let Some(old) = diff.old_i64() {
            ids.push(old);
        }
        if let Some(new) = diff.new_i64() {
            if !ids.contains(&new) {
                ids.push(new);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use medley_core::FieldChange;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn has_key(planned: &[Invalidation], ns: &str, id: i64) -> bool {
        planned.iter().any(|inv| {
            matches!(inv, Invalidation::Key { namespace, params }
                if *namespace == ns && params == &vec![ParamValue::Int(id)])
        })
    }

    fn has_prefix(planned: &[Invalidation], ns: &str) -> bool {
        planned
            .iter()
            .any(|inv| matches!(inv, Invalidation::Prefix { namespace } if *namespace == ns))
    }

    fn entry_created(member: i64) -> ChangeEvent {
        let mut fields = BTreeMap::new();
        fields.insert("member_id".to_string(), json!(member));
        fields.insert("style".to_string(), json!("fr50"));
        fields.insert("seconds".to_string(), json!("29.8"));
        ChangeEvent::created(EntityKind::TimeEntry, 100, fields)
    }

    #[test]
    fn test_entry_create_invalidates_new_owner() {
        let planned = ChangeTracker::<MemoryStore>::plan(&entry_created(1));
        assert!(has_key(&planned, namespace::BEST_TIMES, 1));
        assert!(has_prefix(&planned, namespace::REPORTS));
    }

    #[test]
    fn test_entry_destroy_invalidates_old_owner() {
        let mut fields = BTreeMap::new();
        fields.insert("member_id".to_string(), json!(1));
        fields.insert("seconds".to_string(), json!("29.8"));
        let event = ChangeEvent::destroyed(EntityKind::TimeEntry, 100, fields);

        let planned = ChangeTracker::<MemoryStore>::plan(&event);
        assert!(has_key(&planned, namespace::BEST_TIMES, 1));
    }

    #[test]
    fn test_note_only_update_invalidates_nothing() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "note".to_string(),
            FieldChange::new_pair(json!("old"), json!("new")),
        );
        fields.insert("member_id".to_string(), FieldChange::unchanged(json!(1)));
        let event = ChangeEvent::updated(EntityKind::TimeEntry, 100, fields);

        assert!(ChangeTracker::<MemoryStore>::plan(&event).is_empty());
    }

    #[test]
    fn test_time_update_invalidates_current_owner() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "seconds".to_string(),
            FieldChange::new_pair(json!("29.8"), json!("31.0")),
        );
        fields.insert("member_id".to_string(), FieldChange::unchanged(json!(1)));
        let event = ChangeEvent::updated(EntityKind::TimeEntry, 100, fields);

        let planned = ChangeTracker::<MemoryStore>::plan(&event);
        assert!(has_key(&planned, namespace::BEST_TIMES, 1));
        // Exactly one owner: unchanged foreign keys must not double up.
        assert_eq!(
            planned
                .iter()
                .filter(|inv| matches!(inv, Invalidation::Key { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_reassignment_invalidates_both_owners() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "member_id".to_string(),
            FieldChange::new_pair(json!(1), json!(2)),
        );
        let event = ChangeEvent::updated(EntityKind::TimeEntry, 100, fields);

        let planned = ChangeTracker::<MemoryStore>::plan(&event);
        assert!(has_key(&planned, namespace::BEST_TIMES, 1));
        assert!(has_key(&planned, namespace::BEST_TIMES, 2));
    }

    #[test]
    fn test_member_squad_reassignment_invalidates_both_squads() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "squad_id".to_string(),
            FieldChange::new_pair(json!(10), json!(20)),
        );
        let event = ChangeEvent::updated(EntityKind::Member, 5, fields);

        let planned = ChangeTracker::<MemoryStore>::plan(&event);
        assert!(has_key(&planned, namespace::MEMBER_ROSTER, 10));
        assert!(has_key(&planned, namespace::MEMBER_ROSTER, 20));
    }

    #[test]
    fn test_member_destroy_drops_roster_and_best_times() {
        let mut fields = BTreeMap::new();
        fields.insert("squad_id".to_string(), json!(10));
        fields.insert("active".to_string(), json!(true));
        let event = ChangeEvent::destroyed(EntityKind::Member, 5, fields);

        let planned = ChangeTracker::<MemoryStore>::plan(&event);
        assert!(has_key(&planned, namespace::MEMBER_ROSTER, 10));
        assert!(has_key(&planned, namespace::BEST_TIMES, 5));
    }

    #[tokio::test]
    async fn test_apply_deletes_cached_entries() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(AggregateCache::with_defaults(store));
        let tracker = ChangeTracker::new(Arc::clone(&cache));

        cache
            .write_through(namespace::BEST_TIMES, &[ParamValue::Int(1)], &1i64)
            .await
            .unwrap();
        cache
            .write_through(namespace::REPORTS, &[], &2i64)
            .await
            .unwrap();

        let issued = tracker.apply(&entry_created(1)).await;
        assert_eq!(issued, 2);

        // Both the owner key and the reports namespace are gone.
        assert!(cache.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_apply_on_empty_cache_is_noop() {
        let cache = Arc::new(AggregateCache::with_defaults(Arc::new(MemoryStore::new())));
        let tracker = ChangeTracker::new(cache);

        let issued = tracker.apply(&entry_created(1)).await;
        assert_eq!(issued, 2);
    }

    #[tokio::test]
    async fn test_apply_never_raises_when_store_is_down() {
        use async_trait::async_trait;
        use medley_core::StoreError;
        use std::time::Duration;

        #[derive(Debug, Default)]
        struct DownStore;

        #[async_trait]
        impl CacheStore for DownStore {
            async fn get(&self, _key: &str) -> medley_core::MedleyResult<Option<Vec<u8>>> {
                Err(StoreError::Unavailable {
                    reason: "down".to_string(),
                }
                .into())
            }

            async fn set(
                &self,
                _key: &str,
                _value: Vec<u8>,
                _ttl: Duration,
            ) -> medley_core::MedleyResult<()> {
                Err(StoreError::Unavailable {
                    reason: "down".to_string(),
                }
                .into())
            }

            async fn delete(&self, _key: &str) -> medley_core::MedleyResult<bool> {
                Err(StoreError::Unavailable {
                    reason: "down".to_string(),
                }
                .into())
            }

            async fn delete_prefix(&self, _prefix: &str) -> medley_core::MedleyResult<u64> {
                Err(StoreError::Unavailable {
                    reason: "down".to_string(),
                }
                .into())
            }

            async fn clear(&self) -> medley_core::MedleyResult<()> {
                Err(StoreError::Unavailable {
                    reason: "down".to_string(),
                }
                .into())
            }
        }

        let cache = Arc::new(AggregateCache::with_defaults(Arc::new(DownStore)));
        let tracker = ChangeTracker::new(cache);

        // All deletes fail against the dead store; apply logs and still
        // reports what it issued instead of raising.
        let issued = tracker.apply(&entry_created(1)).await;
        assert_eq!(issued, 2);
    }
}
