//! Background recompute worker.
//!
//! Runs the same aggregate computations as the request path, out of the
//! request path, and writes the results straight through to the cache.
//! Each run walks `Idle -> Running -> {Succeeded, Failed} -> Idle`; the
//! in-progress marker is set before the computation and cleared on both
//! exits, so a failed run never leaves the job key permanently blocked.
//! The marker's TTL covers the remaining case of a worker that dies
//! without clearing it.
//!
//! A worker write may race a tracker delete triggered by a concurrent
//! mutation; last writer wins, and the namespace TTL re-converges the
//! entry. Callers needing strict freshness re-fetch instead of trusting
//! a held value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use uuid::Uuid;

use medley_cache::{encode, namespace, AggregateCache, CacheStore, ParamValue};
use medley_core::MedleyResult;
use medley_stats::{compute, RelationalStore};

use crate::job::{JobKind, JobOutcome, RecomputeJob};

// ============================================================================
// METRICS
// ============================================================================

/// Counters for worker activity.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Jobs that computed and wrote through.
    pub completed: AtomicU64,
    /// Jobs skipped because the job key was already running.
    pub skipped: AtomicU64,
    /// Jobs whose computation failed.
    pub failed: AtomicU64,
}

impl WorkerMetrics {
    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of worker counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
}

// ============================================================================
// WORKER
// ============================================================================

/// Background worker computing aggregates and warming the cache.
pub struct RecomputeWorker<S: CacheStore, R: RelationalStore> {
    cache: Arc<AggregateCache<S>>,
    store: Arc<R>,
    metrics: WorkerMetrics,
}

impl<S, R> RecomputeWorker<S, R>
where
    S: CacheStore,
    R: RelationalStore,
{
    /// Create a worker over the given cache and relational store.
    pub fn new(cache: Arc<AggregateCache<S>>, store: Arc<R>) -> Self {
        Self {
            cache,
            store,
            metrics: WorkerMetrics::default(),
        }
    }

    /// Snapshot the worker counters.
    pub fn metrics(&self) -> WorkerSnapshot {
        self.metrics.snapshot()
    }

    /// Run one job to its terminal state.
    ///
    /// The marker check and set are two store operations, not one atomic
    /// step; an overlapping run squeezing through the gap is the same
    /// accepted duplicate work as a fetch stampede.
    pub async fn run(&self, job: &RecomputeJob) -> JobOutcome {
        let job_key = job.kind.job_key();
        let run_id = Uuid::now_v7();

        let marker_key = match encode(
            namespace::JOB_MARKERS,
            &[ParamValue::Text(job_key.clone())],
        ) {
            Ok(marker_key) => Some(marker_key),
            Err(err) => {
                warn!(%job_key, error = %err, "job marker key unencodable, running unguarded");
                None
            }
        };

        if let Some(marker_key) = &marker_key {
            match self.cache.store().get(marker_key).await {
                Ok(Some(_)) => {
                    info!(%run_id, %job_key, "job already running, skipping");
                    self.metrics.skipped.fetch_add(1, Ordering::Relaxed);
                    return JobOutcome::Skipped;
                }
                Ok(None) => {
                    let marker_ttl = self.cache.config().marker_ttl;
                    if let Err(err) = self
                        .cache
                        .store()
                        .set(marker_key, b"1".to_vec(), marker_ttl)
                        .await
                    {
                        warn!(%job_key, error = %err, "could not set job marker, running unguarded");
                    }
                }
                Err(err) => {
                    warn!(%job_key, error = %err, "marker check failed, running unguarded");
                }
            }
        }

        info!(%run_id, %job_key, "recompute started");
        let result = self.recompute(&job.kind).await;

        if let Some(marker_key) = &marker_key {
            if let Err(err) = self.cache.store().delete(marker_key).await {
                warn!(%job_key, error = %err, "could not clear job marker, TTL will expire it");
            }
        }

        match result {
            Ok(()) => {
                info!(%run_id, %job_key, "recompute completed");
                self.metrics.completed.fetch_add(1, Ordering::Relaxed);
                JobOutcome::Completed
            }
            Err(err) => {
                warn!(%run_id, %job_key, error = %err, "recompute failed, nothing written");
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                JobOutcome::Failed
            }
        }
    }

    /// Consume jobs until the channel closes or shutdown is signalled.
    pub async fn run_loop(
        self: Arc<Self>,
        mut jobs: mpsc::Receiver<RecomputeJob>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                job = jobs.recv() => {
                    match job {
                        Some(job) => {
                            self.run(&job).await;
                        }
                        None => break,
                    }
                }
            }
        }
        info!("recompute worker stopped");
    }

    async fn recompute(&self, kind: &JobKind) -> MedleyResult<()> {
        match kind {
            JobKind::BestTimes(member) => {
                let value = compute::best_times(self.store.as_ref(), &[*member]).await?;
                self.cache
                    .write_through(
                        namespace::BEST_TIMES,
                        &[ParamValue::Int(member.get())],
                        &value,
                    )
                    .await
            }
            JobKind::SquadRoster(squad) => {
                let value = compute::squad_roster(self.store.as_ref(), *squad).await?;
                self.cache
                    .write_through(
                        namespace::MEMBER_ROSTER,
                        &[ParamValue::Int(squad.get())],
                        &value,
                    )
                    .await
            }
            JobKind::SeasonReport => {
                let value = compute::season_report(self.store.as_ref()).await?;
                self.cache.write_through(namespace::REPORTS, &[], &value).await
            }
        }
    }
}
