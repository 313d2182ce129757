//! Change events emitted by the persistence layer.
//!
//! A `ChangeEvent` is the explicit, framework-free record of one committed
//! mutation: which row, which operation, and the before/after value of
//! every field the invalidation policy might care about. The persistence
//! layer constructs it at commit time and hands it to the change tracker
//! as a plain message; nothing here introspects ORM state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of mutated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Member,
    TimeEntry,
}

impl EntityKind {
    /// Returns the string representation of the entity kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Member => "member",
            EntityKind::TimeEntry => "time_entry",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOp {
    Create,
    Update,
    Destroy,
}

/// Before/after pair for a single field.
///
/// Creates carry `Value::Null` as `old`; destroys carry `Value::Null` as
/// `new`. An update may include a field whose value did not change (the
/// owning foreign key is always included so the tracker can key its
/// invalidations); `is_changed` distinguishes the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    /// A field whose value actually changed.
    pub fn new_pair(old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    /// A field carried for context only (same value before and after).
    pub fn unchanged(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            old: value.clone(),
            new: value,
        }
    }

    /// True if the before and after values differ.
    pub fn is_changed(&self) -> bool {
        self.old != self.new
    }

    /// The old value as an integer, if it is one.
    pub fn old_i64(&self) -> Option<i64> {
        self.old.as_i64()
    }

    /// The new value as an integer, if it is one.
    pub fn new_i64(&self) -> Option<i64> {
        self.new.as_i64()
    }
}

/// One committed mutation, produced exactly once by the persistence layer
/// and consumed exactly once by the change tracker. Transient; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub entity_id: i64,
    pub op: ChangeOp,
    /// Field diffs, keyed by field name. Sorted map so event encodings
    /// and debug output are stable.
    pub fields: BTreeMap<String, FieldChange>,
}

impl ChangeEvent {
    /// Event for a freshly inserted row. `fields` holds the new values.
    pub fn created(entity: EntityKind, entity_id: i64, fields: BTreeMap<String, Value>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(name, new)| {
                (
                    name,
                    FieldChange {
                        old: Value::Null,
                        new,
                    },
                )
            })
            .collect();
        Self {
            entity,
            entity_id,
            op: ChangeOp::Create,
            fields,
        }
    }

    /// Event for an updated row, with explicit before/after pairs.
    pub fn updated(
        entity: EntityKind,
        entity_id: i64,
        fields: BTreeMap<String, FieldChange>,
    ) -> Self {
        Self {
            entity,
            entity_id,
            op: ChangeOp::Update,
            fields,
        }
    }

    /// Event for a deleted row. `fields` holds the last committed values.
    pub fn destroyed(entity: EntityKind, entity_id: i64, fields: BTreeMap<String, Value>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(name, old)| {
                (
                    name,
                    FieldChange {
                        old,
                        new: Value::Null,
                    },
                )
            })
            .collect();
        Self {
            entity,
            entity_id,
            op: ChangeOp::Destroy,
            fields,
        }
    }

    /// Look up the diff for a field.
    pub fn field(&self, name: &str) -> Option<&FieldChange> {
        self.fields.get(name)
    }

    /// True if the named field is present and actually changed.
    pub fn changed(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldChange::is_changed)
    }

    /// True if any of the named fields actually changed.
    pub fn any_changed(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.changed(name))
    }
}
