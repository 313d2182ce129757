//! Recompute job descriptions.

use medley_core::{MemberId, SquadId};

/// What a recompute job warms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Recompute one member's best times.
    BestTimes(MemberId),
    /// Recompute one squad's roster.
    SquadRoster(SquadId),
    /// Recompute the season report.
    SeasonReport,
}

impl JobKind {
    /// Stable key identifying the job for the in-progress marker. Two
    /// dispatches with the same key never run concurrently.
    pub fn job_key(&self) -> String {
        match self {
            JobKind::BestTimes(member) => format!("best_times:{}", member),
            JobKind::SquadRoster(squad) => format!("member_roster:{}", squad),
            JobKind::SeasonReport => "season_report".to_string(),
        }
    }
}

/// One dispatched recompute job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecomputeJob {
    pub kind: JobKind,
}

impl RecomputeJob {
    /// Create a job for the given kind.
    pub fn new(kind: JobKind) -> Self {
        Self { kind }
    }
}

/// Terminal state of one job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Computed and written through to the cache.
    Completed,
    /// Another run of the same job key was already in progress.
    Skipped,
    /// The computation failed; nothing was written, the marker was
    /// cleared. Retrying is the dispatcher's decision.
    Failed,
}
