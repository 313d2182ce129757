//! Aggregate computations over the relational store.
//!
//! The computations here are the expensive cross-entity folds the cache
//! layer memoizes: best time per (member, style), squad rosters, and the
//! season report. Each is a bounded number of bulk reads plus one linear
//! pass - never a query per row.
//!
//! [`StatsService`] is the request-path facade that routes every read
//! through the cache; [`InMemoryRelationalStore`] is the reference
//! persistence backend, emitting a [`ChangeEvent`](medley_core::ChangeEvent)
//! after each commit.

pub mod compute;
pub mod memory;
pub mod service;
pub mod store;

pub use compute::{BestTime, BestTimes, RosterMember, SeasonReport, SquadRoster, StyleStats};
pub use memory::InMemoryRelationalStore;
pub use service::StatsService;
pub use store::{MemberUpdate, RelationalStore, TimeEntryUpdate};
