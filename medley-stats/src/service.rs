//! Request-path facade over cache and computation.
//!
//! Request handlers call these methods; each one routes through the
//! read-through cache with the namespace and parameter tuple that the
//! change tracker targets on invalidation. Keeping the key construction
//! in one place is what makes the tracker's deletes line up with the
//! fetches.

use std::sync::Arc;

use medley_cache::{namespace, AggregateCache, CacheStore, ParamValue};
use medley_core::{MedleyResult, MemberId, SquadId};

use crate::compute::{self, BestTimes, SeasonReport, SquadRoster};
use crate::store::RelationalStore;

/// Cached statistics reads.
pub struct StatsService<S: CacheStore, R: RelationalStore> {
    cache: Arc<AggregateCache<S>>,
    store: Arc<R>,
}

impl<S, R> StatsService<S, R>
where
    S: CacheStore,
    R: RelationalStore + 'static,
{
    /// Create a service over the given cache and relational store.
    pub fn new(cache: Arc<AggregateCache<S>>, store: Arc<R>) -> Self {
        Self { cache, store }
    }

    /// Get a reference to the cache.
    pub fn cache(&self) -> &Arc<AggregateCache<S>> {
        &self.cache
    }

    /// Best times for one member, cached under `best_times/<member>`.
    pub async fn best_times_for(&self, member: MemberId) -> MedleyResult<BestTimes> {
        let store = Arc::clone(&self.store);
        self.cache
            .fetch(
                namespace::BEST_TIMES,
                &[ParamValue::Int(member.get())],
                move || async move { compute::best_times(store.as_ref(), &[member]).await },
            )
            .await
    }

    /// Roster for one squad, cached under `member_roster/<squad>`.
    pub async fn roster_for(&self, squad: SquadId) -> MedleyResult<SquadRoster> {
        let store = Arc::clone(&self.store);
        self.cache
            .fetch(
                namespace::MEMBER_ROSTER,
                &[ParamValue::Int(squad.get())],
                move || async move { compute::squad_roster(store.as_ref(), squad).await },
            )
            .await
    }

    /// The season report, cached under the bare `reports` key.
    pub async fn season_report(&self) -> MedleyResult<SeasonReport> {
        let store = Arc::clone(&self.store);
        self.cache
            .fetch(namespace::REPORTS, &[], move || async move {
                compute::season_report(store.as_ref()).await
            })
            .await
    }
}

impl<S: CacheStore, R: RelationalStore> Clone for StatsService<S, R> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
        }
    }
}
