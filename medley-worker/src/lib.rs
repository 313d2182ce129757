//! Background recompute worker for MEDLEY aggregates.
//!
//! The worker consumes [`RecomputeJob`]s from a dispatch channel,
//! recomputes the corresponding aggregate with the same functions the
//! request path uses, and writes the warm result straight into the
//! cache. An in-progress marker per job key prevents overlapping runs;
//! it is cleared on success and on failure, so no job key can stay
//! blocked. There is no retry loop here - re-dispatching is the
//! scheduler's call.

pub mod job;
pub mod worker;

pub use job::{JobKind, JobOutcome, RecomputeJob};
pub use worker::{RecomputeWorker, WorkerMetrics, WorkerSnapshot};
