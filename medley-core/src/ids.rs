//! Identity types for MEDLEY entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

macro_rules! row_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw row identifier.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the raw row identifier.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id! {
    /// Identifier of a team member (the owner of best-time aggregates).
    MemberId
}

row_id! {
    /// Identifier of a squad (training group; the owner of roster aggregates).
    SquadId
}

row_id! {
    /// Identifier of a single recorded time entry.
    EntryId
}

/// Short course/style code such as `"fr50"` or `"br100"`.
///
/// Codes are compared case-sensitively; the persistence layer is expected
/// to normalize them to lowercase before they reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCode(String);

impl StyleCode {
    /// Wrap a style code string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StyleCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl std::fmt::Display for StyleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
