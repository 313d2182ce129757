//! Pure aggregate computations.
//!
//! Each function takes a snapshot of the relational store through its
//! bulk-read interface and folds it in a single linear pass. None of
//! them issues a query per row, and none of them writes anywhere; the
//! cache layer decides what to do with the results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use medley_core::{MedleyResult, MemberId, SquadId, StyleCode};

use crate::store::RelationalStore;

// ============================================================================
// BEST TIMES
// ============================================================================

/// Best recorded time for one (member, style) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestTime {
    pub member_id: MemberId,
    pub style: StyleCode,
    pub seconds: Decimal,
}

/// Best times per (member, style), sorted by member then style.
///
/// A member or style with no contributing entries is simply absent -
/// absence, not zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BestTimes {
    pub rows: Vec<BestTime>,
}

impl BestTimes {
    /// Look up the best time for a member over a style.
    pub fn seconds_for(&self, member: MemberId, style: &str) -> Option<Decimal> {
        self.rows
            .iter()
            .find(|row| row.member_id == member && row.style.as_str() == style)
            .map(|row| row.seconds)
    }

    /// True if no entry contributed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Minimum seconds per (member, style) across the given members.
///
/// One bulk fetch, one pass. When two entries tie on the minimal value
/// either may be retained; the aggregate is a value, not a row
/// reference, so the choice is unobservable.
pub async fn best_times<R>(store: &R, members: &[MemberId]) -> MedleyResult<BestTimes>
where
    R: RelationalStore + ?Sized,
{
    let entries = store.entries_for_members(members).await?;

    let mut best: HashMap<(MemberId, StyleCode), Decimal> = HashMap::new();
    for entry in entries {
        let seconds = entry.seconds;
        best.entry((entry.member_id, entry.style))
            .and_modify(|current| {
                if seconds < *current {
                    *current = seconds;
                }
            })
            .or_insert(seconds);
    }

    let mut rows: Vec<BestTime> = best
        .into_iter()
        .map(|((member_id, style), seconds)| BestTime {
            member_id,
            style,
            seconds,
        })
        .collect();
    rows.sort_by(|a, b| (a.member_id, &a.style).cmp(&(b.member_id, &b.style)));
    Ok(BestTimes { rows })
}

// ============================================================================
// SQUAD ROSTER
// ============================================================================

/// One member on a roster listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterMember {
    pub member_id: MemberId,
    pub name: String,
}

/// A squad's membership, grouped by activity and sorted by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadRoster {
    pub squad_id: SquadId,
    pub active: Vec<RosterMember>,
    pub inactive: Vec<RosterMember>,
}

/// Group a squad's members into active and inactive lists.
pub async fn squad_roster<R>(store: &R, squad: SquadId) -> MedleyResult<SquadRoster>
where
    R: RelationalStore + ?Sized,
{
    let members = store.members_in_squad(squad).await?;

    let mut active = Vec::new();
    let mut inactive = Vec::new();
    for member in members {
        let row = RosterMember {
            member_id: member.member_id,
            name: member.name,
        };
        if member.active {
            active.push(row);
        } else {
            inactive.push(row);
        }
    }
    active.sort_by(|a, b| (&a.name, a.member_id).cmp(&(&b.name, b.member_id)));
    inactive.sort_by(|a, b| (&a.name, a.member_id).cmp(&(&b.name, b.member_id)));

    Ok(SquadRoster {
        squad_id: squad,
        active,
        inactive,
    })
}

// ============================================================================
// SEASON REPORT
// ============================================================================

/// Per-style statistics for the season report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleStats {
    pub style: StyleCode,
    pub entries: u64,
    pub fastest: Decimal,
    pub mean_seconds: Decimal,
}

/// Season-wide statistics over every recorded entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeasonReport {
    pub total_entries: u64,
    pub styles: Vec<StyleStats>,
}

/// Count, fastest and mean seconds per style, in one pass over one bulk
/// fetch.
pub async fn season_report<R>(store: &R) -> MedleyResult<SeasonReport>
where
    R: RelationalStore + ?Sized,
{
    let entries = store.all_entries().await?;
    let total_entries = entries.len() as u64;

    struct Accumulator {
        count: u64,
        fastest: Decimal,
        sum: Decimal,
    }

    let mut per_style: HashMap<StyleCode, Accumulator> = HashMap::new();
    for entry in entries {
        let seconds = entry.seconds;
        per_style
            .entry(entry.style)
            .and_modify(|acc| {
                acc.count += 1;
                acc.sum += seconds;
                if seconds < acc.fastest {
                    acc.fastest = seconds;
                }
            })
            .or_insert(Accumulator {
                count: 1,
                fastest: seconds,
                sum: seconds,
            });
    }

    let mut styles: Vec<StyleStats> = per_style
        .into_iter()
        .map(|(style, acc)| StyleStats {
            style,
            entries: acc.count,
            fastest: acc.fastest,
            mean_seconds: (acc.sum / Decimal::from(acc.count)).round_dp(2),
        })
        .collect();
    styles.sort_by(|a, b| a.style.cmp(&b.style));

    Ok(SeasonReport {
        total_entries,
        styles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRelationalStore;
    use chrono::Utc;
    use medley_core::{EntryId, TimeEntry};

    async fn seeded_store() -> InMemoryRelationalStore {
        let store = InMemoryRelationalStore::new();
        for (id, member, style, seconds) in [
            (1, 1, "fr50", Decimal::new(302, 1)),
            (2, 1, "fr50", Decimal::new(298, 1)),
            (3, 1, "br50", Decimal::new(350, 1)),
        ] {
            store
                .insert_entry(TimeEntry {
                    entry_id: EntryId::new(id),
                    member_id: MemberId::new(member),
                    style: StyleCode::new(style),
                    seconds,
                    recorded_at: Utc::now(),
                    note: None,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_best_times_keeps_minimum_per_member_and_style() {
        let store = seeded_store().await;
        let result = best_times(&store, &[MemberId::new(1)]).await.unwrap();

        assert_eq!(
            result.seconds_for(MemberId::new(1), "fr50"),
            Some(Decimal::new(298, 1))
        );
        assert_eq!(
            result.seconds_for(MemberId::new(1), "br50"),
            Some(Decimal::new(350, 1))
        );
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_best_times_absent_member_is_absent_not_zero() {
        let store = seeded_store().await;
        let result = best_times(&store, &[MemberId::new(99)]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.seconds_for(MemberId::new(99), "fr50"), None);
    }

    #[tokio::test]
    async fn test_best_times_ties_keep_the_value() {
        let store = InMemoryRelationalStore::new();
        for id in [1, 2] {
            store
                .insert_entry(TimeEntry {
                    entry_id: EntryId::new(id),
                    member_id: MemberId::new(1),
                    style: StyleCode::new("fr50"),
                    seconds: Decimal::new(298, 1),
                    recorded_at: Utc::now(),
                    note: None,
                })
                .await
                .unwrap();
        }

        let result = best_times(&store, &[MemberId::new(1)]).await.unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.seconds_for(MemberId::new(1), "fr50"),
            Some(Decimal::new(298, 1))
        );
    }

    #[tokio::test]
    async fn test_best_times_rows_are_sorted() {
        let store = seeded_store().await;
        let result = best_times(&store, &[MemberId::new(1)]).await.unwrap();
        let styles: Vec<&str> = result.rows.iter().map(|r| r.style.as_str()).collect();
        assert_eq!(styles, vec!["br50", "fr50"]);
    }

    #[tokio::test]
    async fn test_squad_roster_groups_and_sorts() {
        let store = InMemoryRelationalStore::new();
        for (id, name, active) in [(1, "Noor", true), (2, "Alex", true), (3, "Sam", false)] {
            store
                .insert_member(medley_core::Member {
                    member_id: MemberId::new(id),
                    name: name.to_string(),
                    squad_id: SquadId::new(10),
                    active,
                    joined_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let roster = squad_roster(&store, SquadId::new(10)).await.unwrap();
        let active: Vec<&str> = roster.active.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(active, vec!["Alex", "Noor"]);
        assert_eq!(roster.inactive.len(), 1);
        assert_eq!(roster.inactive[0].name, "Sam");
    }

    #[tokio::test]
    async fn test_empty_squad_roster() {
        let store = InMemoryRelationalStore::new();
        let roster = squad_roster(&store, SquadId::new(10)).await.unwrap();
        assert!(roster.active.is_empty());
        assert!(roster.inactive.is_empty());
    }

    #[tokio::test]
    async fn test_season_report_single_pass_statistics() {
        let store = seeded_store().await;
        let report = season_report(&store).await.unwrap();

        assert_eq!(report.total_entries, 3);
        let fr50 = report
            .styles
            .iter()
            .find(|s| s.style.as_str() == "fr50")
            .unwrap();
        assert_eq!(fr50.entries, 2);
        assert_eq!(fr50.fastest, Decimal::new(298, 1));
        assert_eq!(fr50.mean_seconds, Decimal::new(3000, 2));
    }

    #[tokio::test]
    async fn test_season_report_over_empty_store() {
        let store = InMemoryRelationalStore::new();
        let report = season_report(&store).await.unwrap();
        assert_eq!(report.total_entries, 0);
        assert!(report.styles.is_empty());
    }
}
