//! Core entity structures

use crate::{EntryId, MemberId, SquadId, StyleCode, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Member - a swimmer on the team roster.
///
/// Members own the `best_times` aggregate; their squad assignment owns
/// the `member_roster` aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    pub name: String,
    pub squad_id: SquadId,
    pub active: bool,
    pub joined_at: Timestamp,
}

/// TimeEntry - one recorded swim over a given style/distance.
///
/// Entries are the rows the best-time aggregation folds over. `seconds`
/// is an exact decimal so equal times compare equal regardless of how
/// they were keyed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub entry_id: EntryId,
    pub member_id: MemberId,
    pub style: StyleCode,
    pub seconds: Decimal,
    pub recorded_at: Timestamp,
    /// Free-text coach note; never contributes to any aggregate.
    pub note: Option<String>,
}
