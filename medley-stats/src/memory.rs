//! In-memory relational store with after-commit change notification.
//!
//! Reference implementation of [`RelationalStore`] plus the mutation
//! surface the real persistence layer would expose. Every mutation
//! commits under the write lock, and the corresponding
//! [`ChangeEvent`] is published only after the lock is released - so a
//! subscriber that reacts to an event always observes the committed
//! state, never a pre-commit snapshot (commit-then-notify).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{broadcast, RwLock};

use medley_core::{
    ChangeEvent, DataError, EntityKind, EntryId, FieldChange, Member, MedleyResult, MemberId,
    SquadId, TimeEntry,
};

use crate::store::{MemberUpdate, RelationalStore, TimeEntryUpdate};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct Tables {
    members: HashMap<MemberId, Member>,
    entries: HashMap<EntryId, TimeEntry>,
}

/// In-memory relational store.
pub struct InMemoryRelationalStore {
    tables: RwLock<Tables>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Default for InMemoryRelationalStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tables: RwLock::new(Tables::default()),
            events,
        }
    }
}

impl InMemoryRelationalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to committed-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            entity = %event.entity,
            entity_id = event.entity_id,
            op = ?event.op,
            "committed change published"
        );
        // A send error only means no subscriber is listening.
        let _ = self.events.send(event);
    }

    // ========================================================================
    // MEMBER MUTATIONS
    // ========================================================================

    /// Insert a member and publish the create event.
    pub async fn insert_member(&self, member: Member) -> MedleyResult<()> {
        let event = {
            let mut tables = self.tables.write().await;
            let fields = member_fields(&member);
            tables.members.insert(member.member_id, member.clone());
            ChangeEvent::created(EntityKind::Member, member.member_id.get(), fields)
        };
        self.publish(event);
        Ok(())
    }

    /// Apply a partial update to a member and publish the diff.
    pub async fn update_member(
        &self,
        id: MemberId,
        update: MemberUpdate,
    ) -> MedleyResult<Member> {
        let (member, event) = {
            let mut tables = self.tables.write().await;
            let member = tables.members.get_mut(&id).ok_or(DataError::NotFound {
                entity: EntityKind::Member,
                id: id.get(),
            })?;

            let mut fields = BTreeMap::new();
            if let Some(name) = update.name {
                if name != member.name {
                    fields.insert(
                        "name".to_string(),
                        FieldChange::new_pair(json!(member.name), json!(name)),
                    );
                    member.name = name;
                }
            }
            if let Some(squad_id) = update.squad_id {
                if squad_id != member.squad_id {
                    fields.insert(
                        "squad_id".to_string(),
                        FieldChange::new_pair(json!(member.squad_id.get()), json!(squad_id.get())),
                    );
                    member.squad_id = squad_id;
                }
            }
            if let Some(active) = update.active {
                if active != member.active {
                    fields.insert(
                        "active".to_string(),
                        FieldChange::new_pair(json!(member.active), json!(active)),
                    );
                    member.active = active;
                }
            }
            // The owning squad is always carried so the tracker can key
            // its invalidations, changed or not.
            fields
                .entry("squad_id".to_string())
                .or_insert_with(|| FieldChange::unchanged(json!(member.squad_id.get())));

            let event = ChangeEvent::updated(EntityKind::Member, id.get(), fields);
            (member.clone(), event)
        };
        self.publish(event);
        Ok(member)
    }

    /// Remove a member and publish the destroy event.
    pub async fn delete_member(&self, id: MemberId) -> MedleyResult<Member> {
        let (member, event) = {
            let mut tables = self.tables.write().await;
            let member = tables.members.remove(&id).ok_or(DataError::NotFound {
                entity: EntityKind::Member,
                id: id.get(),
            })?;
            let event =
                ChangeEvent::destroyed(EntityKind::Member, id.get(), member_fields(&member));
            (member, event)
        };
        self.publish(event);
        Ok(member)
    }

    // ========================================================================
    // TIME ENTRY MUTATIONS
    // ========================================================================

    /// Insert a time entry and publish the create event.
    pub async fn insert_entry(&self, entry: TimeEntry) -> MedleyResult<()> {
        let event = {
            let mut tables = self.tables.write().await;
            let fields = entry_fields(&entry);
            tables.entries.insert(entry.entry_id, entry.clone());
            ChangeEvent::created(EntityKind::TimeEntry, entry.entry_id.get(), fields)
        };
        self.publish(event);
        Ok(())
    }

    /// Apply a partial update to a time entry and publish the diff.
    pub async fn update_entry(
        &self,
        id: EntryId,
        update: TimeEntryUpdate,
    ) -> MedleyResult<TimeEntry> {
        let (entry, event) = {
            let mut tables = self.tables.write().await;
            let entry = tables.entries.get_mut(&id).ok_or(DataError::NotFound {
                entity: EntityKind::TimeEntry,
                id: id.get(),
            })?;

            let mut fields = BTreeMap::new();
            if let Some(seconds) = update.seconds {
                if seconds != entry.seconds {
                    fields.insert(
                        "seconds".to_string(),
                        FieldChange::new_pair(decimal_value(entry.seconds), decimal_value(seconds)),
                    );
                    entry.seconds = seconds;
                }
            }
            if let Some(style) = update.style {
                if style != entry.style {
                    fields.insert(
                        "style".to_string(),
                        FieldChange::new_pair(json!(entry.style.as_str()), json!(style.as_str())),
                    );
                    entry.style = style;
                }
            }
            if let Some(member_id) = update.member_id {
                if member_id != entry.member_id {
                    fields.insert(
                        "member_id".to_string(),
                        FieldChange::new_pair(
                            json!(entry.member_id.get()),
                            json!(member_id.get()),
                        ),
                    );
                    entry.member_id = member_id;
                }
            }
            if let Some(note) = update.note {
                if note != entry.note {
                    fields.insert(
                        "note".to_string(),
                        FieldChange::new_pair(json!(entry.note), json!(note)),
                    );
                    entry.note = note;
                }
            }
            fields
                .entry("member_id".to_string())
                .or_insert_with(|| FieldChange::unchanged(json!(entry.member_id.get())));

            let event = ChangeEvent::updated(EntityKind::TimeEntry, id.get(), fields);
            (entry.clone(), event)
        };
        self.publish(event);
        Ok(entry)
    }

    /// Remove a time entry and publish the destroy event.
    pub async fn delete_entry(&self, id: EntryId) -> MedleyResult<TimeEntry> {
        let (entry, event) = {
            let mut tables = self.tables.write().await;
            let entry = tables.entries.remove(&id).ok_or(DataError::NotFound {
                entity: EntityKind::TimeEntry,
                id: id.get(),
            })?;
            let event =
                ChangeEvent::destroyed(EntityKind::TimeEntry, id.get(), entry_fields(&entry));
            (entry, event)
        };
        self.publish(event);
        Ok(entry)
    }
}

fn member_fields(member: &Member) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), json!(member.name));
    fields.insert("squad_id".to_string(), json!(member.squad_id.get()));
    fields.insert("active".to_string(), json!(member.active));
    fields
}

fn entry_fields(entry: &TimeEntry) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("member_id".to_string(), json!(entry.member_id.get()));
    fields.insert("style".to_string(), json!(entry.style.as_str()));
    fields.insert("seconds".to_string(), decimal_value(entry.seconds));
    fields.insert("note".to_string(), json!(entry.note));
    fields
}

fn decimal_value(seconds: rust_decimal::Decimal) -> Value {
    json!(seconds.normalize().to_string())
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    async fn entries_for_members(&self, members: &[MemberId]) -> MedleyResult<Vec<TimeEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entries
            .values()
            .filter(|entry| members.contains(&entry.member_id))
            .cloned()
            .collect())
    }

    async fn all_entries(&self) -> MedleyResult<Vec<TimeEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.entries.values().cloned().collect())
    }

    async fn members_in_squad(&self, squad: SquadId) -> MedleyResult<Vec<Member>> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .values()
            .filter(|member| member.squad_id == squad)
            .cloned()
            .collect())
    }

    async fn all_members(&self) -> MedleyResult<Vec<Member>> {
        let tables = self.tables.read().await;
        Ok(tables.members.values().cloned().collect())
    }
}
