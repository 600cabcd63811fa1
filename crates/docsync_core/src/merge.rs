//! Merge rules for combining snapshots with incoming data.
//!
//! All functions here are pure: they never mutate their inputs and the same
//! inputs always produce the same output.
//!
//! ## Rules ([`MergePolicy::KeepPopulated`])
//!
//! For every collection named by the incoming data:
//! - Non-empty incoming value replaces the previous one
//! - Empty incoming value keeps a non-empty previous value
//! - Both empty stores the (empty) incoming value
//! - Two settings objects merge key by key; blank values never overwrite
//! - Repeated ids in an incoming list collapse to the first position with
//!   the last contents
//!
//! Collections not named by the incoming data are left untouched.

use crate::collection::{is_blank, Collection, CollectionKind};
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::ids::{validate_collection_name, EntityId};
use crate::snapshot::{PartitionData, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Policy for folding remote reads into a previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Never regress populated data to empty on an empty read.
    #[default]
    KeepPopulated,
    /// Incoming collections always replace previous ones.
    ///
    /// Only sound when the caller can tell an empty store from a failed read.
    ReplaceAll,
}

impl MergePolicy {
    /// Returns the kebab-case policy name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MergePolicy::KeepPopulated => "keep-populated",
            MergePolicy::ReplaceAll => "replace-all",
        }
    }

    /// Merges incoming partial data into a snapshot.
    #[must_use]
    pub fn merge(&self, previous: &Snapshot, incoming: &PartitionData) -> Snapshot {
        Snapshot {
            partition: previous.partition.clone(),
            collections: self.merge_data(&previous.collections, incoming),
        }
    }

    /// Merges incoming partial data into bare partition data.
    #[must_use]
    pub fn merge_data(&self, previous: &PartitionData, incoming: &PartitionData) -> PartitionData {
        let mut merged = previous.clone();
        for (name, value) in incoming {
            let next = self.merge_collection(previous.get(name), value);
            merged.insert(name.clone(), next);
        }
        merged
    }

    /// Merges one incoming collection with its previous value.
    ///
    /// Incoming lists are normalized first, so a repeated id never reaches
    /// the snapshot.
    #[must_use]
    pub fn merge_collection(&self, previous: Option<&Collection>, incoming: &Collection) -> Collection {
        let incoming = incoming.clone().normalized();
        match self {
            MergePolicy::ReplaceAll => incoming,
            MergePolicy::KeepPopulated => match (previous, incoming) {
                (Some(Collection::Settings(prev)), Collection::Settings(next)) => {
                    Collection::Settings(merge_settings(prev, &next))
                }
                (Some(prev), next) if next.is_empty() && !prev.is_empty() => prev.clone(),
                (_, next) => next,
            },
        }
    }

    /// Inserts or replaces an entity after a confirmed write.
    ///
    /// Lists replace an existing id in place and append new ids. Settings
    /// collections take every key of the entity's fields, including blank
    /// ones: a confirmed write is an explicit intent to clear a value.
    /// A missing collection is created as a list.
    pub fn upsert(previous: &Snapshot, collection: &str, entity: Entity) -> CoreResult<Snapshot> {
        Self::upsert_into(previous, collection, CollectionKind::List, entity)
    }

    /// Like [`upsert`](Self::upsert), but a missing collection is created
    /// with the given kind.
    pub fn upsert_into(
        previous: &Snapshot,
        collection: &str,
        kind: CollectionKind,
        entity: Entity,
    ) -> CoreResult<Snapshot> {
        validate_collection_name(collection)?;
        let mut next = previous.clone();
        let slot = next
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::empty(kind));

        match slot {
            Collection::List(items) => upsert_entity(items, entity),
            Collection::Settings(map) => {
                for (key, value) in entity.fields {
                    map.insert(key, value);
                }
            }
        }
        Ok(next)
    }

    /// Removes an entity from a list after a confirmed delete.
    ///
    /// Removing an unknown id, or from a missing collection, is a no-op.
    pub fn remove(previous: &Snapshot, collection: &str, id: &EntityId) -> CoreResult<Snapshot> {
        validate_collection_name(collection)?;
        let mut next = previous.clone();
        match next.collections.get_mut(collection) {
            Some(Collection::List(items)) => items.retain(|e| &e.id != id),
            Some(Collection::Settings(_)) => {
                return Err(CoreError::KindMismatch {
                    collection: collection.to_string(),
                    expected: CollectionKind::List.name(),
                    actual: CollectionKind::Settings.name(),
                });
            }
            None => {}
        }
        Ok(next)
    }

    /// Replaces a whole collection with an authoritative value.
    ///
    /// Used for push deliveries, which carry the full current state.
    #[must_use]
    pub fn replace_collection(previous: &Snapshot, collection: &str, value: Collection) -> Snapshot {
        let mut next = previous.clone();
        next.collections.insert(collection.to_string(), value);
        next
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-populated" => Ok(MergePolicy::KeepPopulated),
            "replace-all" => Ok(MergePolicy::ReplaceAll),
            other => Err(format!("unknown merge policy: {other}")),
        }
    }
}

/// Key-level replace-if-present merge of two settings objects.
fn merge_settings(previous: &Map<String, Value>, incoming: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = previous.clone();
    for (key, value) in incoming {
        let keep_previous = is_blank(value) && merged.get(key).is_some_and(|v| !is_blank(v));
        if !keep_previous {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Replaces an entity with the same id in place, or appends it.
///
/// Store-assigned timestamps on the existing entity survive a replacement
/// that does not carry its own.
fn upsert_entity(items: &mut Vec<Entity>, mut entity: Entity) {
    match items.iter().position(|e| e.id == entity.id) {
        Some(index) => {
            let existing = &items[index];
            entity.created_at = entity.created_at.or(existing.created_at);
            entity.updated_at = entity.updated_at.or(existing.updated_at);
            items[index] = entity;
        }
        None => items.push(entity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PartitionKey;
    use serde_json::json;

    fn course(id: &str, title: &str) -> Entity {
        Entity::new(EntityId::new(id).unwrap()).with_field("title", title)
    }

    fn snapshot_with(name: &str, value: Collection) -> Snapshot {
        let mut data = PartitionData::new();
        data.insert(name.into(), value);
        Snapshot::with_collections(PartitionKey::new("en").unwrap(), data)
    }

    fn settings(value: Value) -> Collection {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_read_keeps_populated_list() {
        let previous = snapshot_with("courses", Collection::List(vec![course("c1", "Logic")]));
        let mut incoming = PartitionData::new();
        incoming.insert("courses".into(), Collection::List(vec![]));

        let merged = MergePolicy::KeepPopulated.merge(&previous, &incoming);
        assert_eq!(merged.list("courses"), &[course("c1", "Logic")]);
    }

    #[test]
    fn non_empty_read_replaces() {
        let previous = snapshot_with("courses", Collection::List(vec![course("c1", "Logic")]));
        let mut incoming = PartitionData::new();
        incoming.insert("courses".into(), Collection::List(vec![course("c9", "Rhetoric")]));

        let merged = MergePolicy::KeepPopulated.merge(&previous, &incoming);
        assert_eq!(merged.list("courses"), &[course("c9", "Rhetoric")]);
    }

    #[test]
    fn both_empty_stores_empty() {
        let previous = Snapshot::empty(PartitionKey::new("en").unwrap());
        let mut incoming = PartitionData::new();
        incoming.insert("posts".into(), Collection::List(vec![]));

        let merged = MergePolicy::KeepPopulated.merge(&previous, &incoming);
        assert_eq!(merged.collection("posts"), Some(&Collection::List(vec![])));
    }

    #[test]
    fn absent_collections_untouched() {
        let previous = snapshot_with("courses", Collection::List(vec![course("c1", "Logic")]));
        let merged = MergePolicy::KeepPopulated.merge(&previous, &PartitionData::new());
        assert_eq!(merged, previous);
    }

    #[test]
    fn settings_merge_key_by_key() {
        let previous = snapshot_with(
            "theme",
            settings(json!({"primaryColor": "#003366", "font": "serif"})),
        );
        let mut incoming = PartitionData::new();
        incoming.insert(
            "theme".into(),
            settings(json!({"primaryColor": "#990000", "font": "", "logo": "x.png"})),
        );

        let merged = MergePolicy::KeepPopulated.merge(&previous, &incoming);
        assert_eq!(
            merged.settings("theme"),
            settings(json!({"primaryColor": "#990000", "font": "serif", "logo": "x.png"}))
                .as_settings()
        );
    }

    #[test]
    fn replace_all_regresses_to_empty() {
        let previous = snapshot_with("courses", Collection::List(vec![course("c1", "Logic")]));
        let mut incoming = PartitionData::new();
        incoming.insert("courses".into(), Collection::List(vec![]));

        let merged = MergePolicy::ReplaceAll.merge(&previous, &incoming);
        assert!(merged.list("courses").is_empty());
    }

    #[test]
    fn upsert_replaces_in_place_and_appends() {
        let previous = snapshot_with(
            "courses",
            Collection::List(vec![course("c1", "Logic"), course("c2", "AI"), course("c3", "Art")]),
        );

        let replaced = MergePolicy::upsert(&previous, "courses", course("c2", "Machine Learning")).unwrap();
        let ids: Vec<_> = replaced.list("courses").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        assert_eq!(replaced.list("courses")[1].str_field("title"), Some("Machine Learning"));

        let appended = MergePolicy::upsert(&replaced, "courses", course("c4", "Music")).unwrap();
        assert_eq!(appended.list("courses").last().unwrap().id.as_str(), "c4");
        assert_eq!(appended.list("courses").len(), 4);
    }

    #[test]
    fn upsert_keeps_store_timestamps() {
        use crate::ids::Timestamp;

        let stored = course("c1", "Logic").with_created_at(Timestamp::from_millis(100));
        let previous = snapshot_with("courses", Collection::List(vec![stored]));

        let next = MergePolicy::upsert(&previous, "courses", course("c1", "Formal Logic")).unwrap();
        let updated = &next.list("courses")[0];
        assert_eq!(updated.str_field("title"), Some("Formal Logic"));
        assert_eq!(updated.created_at, Some(Timestamp::from_millis(100)));
    }

    #[test]
    fn upsert_into_settings_takes_all_keys() {
        let previous = snapshot_with("theme", settings(json!({"font": "serif", "logo": "a.png"})));
        let write = Entity::new(EntityId::new("theme").unwrap())
            .with_field("logo", "")
            .with_field("primaryColor", "#111111");

        let next = MergePolicy::upsert(&previous, "theme", write).unwrap();
        assert_eq!(
            next.settings("theme"),
            settings(json!({"font": "serif", "logo": "", "primaryColor": "#111111"})).as_settings()
        );
    }

    #[test]
    fn upsert_creates_missing_list() {
        let previous = Snapshot::empty(PartitionKey::new("en").unwrap());
        let next = MergePolicy::upsert(&previous, "posts", course("p1", "Hello")).unwrap();
        assert_eq!(next.list("posts").len(), 1);
        assert!(previous.is_empty());
    }

    #[test]
    fn upsert_into_creates_missing_settings() {
        let previous = Snapshot::empty(PartitionKey::new("en").unwrap());
        let write = Entity::new(EntityId::new("main").unwrap()).with_field("logo", "logo.png");
        let next = MergePolicy::upsert_into(&previous, "theme", CollectionKind::Settings, write).unwrap();
        assert_eq!(
            next.settings("theme").and_then(|s| s.get("logo")),
            Some(&json!("logo.png"))
        );
    }

    #[test]
    fn incoming_duplicates_collapse() {
        let previous = Snapshot::empty(PartitionKey::new("en").unwrap());
        let mut incoming = PartitionData::new();
        incoming.insert(
            "courses".into(),
            Collection::List(vec![course("c1", "A"), course("c2", "B"), course("c1", "C")]),
        );

        for policy in [MergePolicy::KeepPopulated, MergePolicy::ReplaceAll] {
            let merged = policy.merge(&previous, &incoming);
            let items = merged.list("courses");
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].str_field("title"), Some("C"));
            assert_eq!(items[1].id.as_str(), "c2");
        }
    }

    #[test]
    fn remove_from_list() {
        let previous = snapshot_with(
            "courses",
            Collection::List(vec![course("c1", "Logic"), course("c2", "AI")]),
        );
        let next = MergePolicy::remove(&previous, "courses", &EntityId::new("c1").unwrap()).unwrap();
        assert_eq!(next.list("courses"), &[course("c2", "AI")]);

        let unchanged = MergePolicy::remove(&next, "courses", &EntityId::new("zz").unwrap()).unwrap();
        assert_eq!(unchanged, next);
    }

    #[test]
    fn remove_from_settings_is_rejected() {
        let previous = snapshot_with("theme", settings(json!({"font": "serif"})));
        let err = MergePolicy::remove(&previous, "theme", &EntityId::new("font").unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::KindMismatch { .. }));
    }

    #[test]
    fn invalid_collection_name_rejected() {
        let previous = Snapshot::empty(PartitionKey::new("en").unwrap());
        assert!(MergePolicy::upsert(&previous, "", course("c1", "Logic")).is_err());
        assert!(MergePolicy::remove(&previous, "a/b", &EntityId::new("c1").unwrap()).is_err());
    }

    #[test]
    fn replace_collection_is_authoritative() {
        let previous = snapshot_with("clips", Collection::List(vec![course("k1", "x")]));
        let next = MergePolicy::replace_collection(&previous, "clips", Collection::List(vec![]));
        assert!(next.list("clips").is_empty());
    }

    #[test]
    fn policy_names() {
        assert_eq!("keep-populated".parse::<MergePolicy>(), Ok(MergePolicy::KeepPopulated));
        assert_eq!("replace-all".parse::<MergePolicy>(), Ok(MergePolicy::ReplaceAll));
        assert!("newest".parse::<MergePolicy>().is_err());
        assert_eq!(MergePolicy::default().to_string(), "keep-populated");
    }
}
