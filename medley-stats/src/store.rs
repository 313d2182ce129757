//! Relational store interface.
//!
//! The aggregate layer needs exactly two things from persistence: bulk
//! reads shaped for single-pass folding, and a change event after every
//! committed mutation. Everything else (row CRUD, validation, routing)
//! lives outside this workspace.

use async_trait::async_trait;
use medley_core::{Member, MedleyResult, MemberId, SquadId, StyleCode, TimeEntry};
use rust_decimal::Decimal;

/// Bulk read operations over the relational store.
///
/// Implementations must resolve each call with a bounded number of
/// queries regardless of row count; the compute layer relies on that to
/// avoid per-row round trips.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// All time entries belonging to any of the given members.
    async fn entries_for_members(&self, members: &[MemberId]) -> MedleyResult<Vec<TimeEntry>>;

    /// Every time entry on record.
    async fn all_entries(&self) -> MedleyResult<Vec<TimeEntry>>;

    /// All members assigned to a squad, active or not.
    async fn members_in_squad(&self, squad: SquadId) -> MedleyResult<Vec<Member>>;

    /// Every member on record.
    async fn all_members(&self) -> MedleyResult<Vec<Member>>;
}

/// Partial update of a time entry. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TimeEntryUpdate {
    pub seconds: Option<Decimal>,
    pub style: Option<StyleCode>,
    /// Reassigns the entry to another member.
    pub member_id: Option<MemberId>,
    /// `Some(None)` clears the note.
    pub note: Option<Option<String>>,
}

/// Partial update of a member. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct MemberUpdate {
    pub name: Option<String>,
    /// Moves the member to another squad.
    pub squad_id: Option<SquadId>,
    pub active: Option<bool>,
}
