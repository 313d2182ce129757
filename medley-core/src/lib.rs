//! MEDLEY Core - Domain Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no caching or aggregation logic.

pub mod change;
pub mod entities;
pub mod error;
pub mod ids;

pub use change::{ChangeEvent, ChangeOp, EntityKind, FieldChange};
pub use entities::{Member, TimeEntry};
pub use error::{
    ComputeError, DataError, EncodeError, MedleyError, MedleyResult, StoreError,
};
pub use ids::{EntryId, MemberId, SquadId, StyleCode, Timestamp};
