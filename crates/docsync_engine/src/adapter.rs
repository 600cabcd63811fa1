//! Turns store deliveries into ordered, fully materialized collections.
//!
//! Every delivery is the whole collection, so the adapter rebuilds the
//! sequence from scratch each time. The only state it keeps is the
//! placeholder ordering key of entities whose server timestamp is pending.
//!
//! ## Placeholder ordering
//!
//! An entity without `created_at` sorts as if it had been created when the
//! engine first received it. Placeholders are remembered per id across
//! deliveries and dropped once the authoritative timestamp arrives. Among
//! entities with the same effective time, resolved ones come first, then
//! placeholders in the order they were first received.

use crate::config::{CollectionOrder, CollectionSpec};
use crate::store::RemoteDocument;
use docsync_core::{dedupe_by_id, Collection, CollectionKind, Entity, EntityId, Timestamp};
use serde_json::Map;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Placeholder {
    received_at: Timestamp,
    seq: u64,
}

/// Normalizes deliveries for one collection of one partition.
#[derive(Debug, Clone)]
pub struct SubscriptionAdapter {
    kind: CollectionKind,
    order: CollectionOrder,
    placeholders: HashMap<EntityId, Placeholder>,
    next_seq: u64,
}

impl SubscriptionAdapter {
    /// Creates an adapter.
    pub fn new(kind: CollectionKind, order: CollectionOrder) -> Self {
        Self {
            kind,
            order,
            placeholders: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Creates an adapter for a configured collection.
    pub fn for_spec(spec: &CollectionSpec) -> Self {
        Self::new(spec.kind, spec.order)
    }

    /// Builds the collection value for a delivery received at `received_at`.
    ///
    /// Documents with invalid ids are skipped. A repeated id keeps its first
    /// position and its last contents.
    pub fn materialize(&mut self, documents: Vec<RemoteDocument>, received_at: Timestamp) -> Collection {
        match self.kind {
            CollectionKind::Settings => Collection::Settings(fold_settings(documents)),
            CollectionKind::List => {
                let mut entities = to_entities(documents);
                self.track_placeholders(&entities, received_at);
                if self.order == CollectionOrder::CreatedDesc {
                    entities.sort_by_cached_key(|e| self.sort_key(e));
                }
                Collection::List(entities)
            }
        }
    }

    /// Returns the placeholder time of a pending entity.
    pub fn placeholder(&self, id: &EntityId) -> Option<Timestamp> {
        self.placeholders.get(id).map(|p| p.received_at)
    }

    /// Number of entities currently ordered by a placeholder.
    pub fn pending_count(&self) -> usize {
        self.placeholders.len()
    }

    fn track_placeholders(&mut self, entities: &[Entity], received_at: Timestamp) {
        let pending: HashSet<&EntityId> = entities
            .iter()
            .filter(|e| e.is_pending())
            .map(|e| &e.id)
            .collect();
        self.placeholders.retain(|id, _| pending.contains(id));

        for entity in entities.iter().filter(|e| e.is_pending()) {
            if !self.placeholders.contains_key(&entity.id) {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.placeholders
                    .insert(entity.id.clone(), Placeholder { received_at, seq });
            }
        }
    }

    fn sort_key(&self, entity: &Entity) -> (Reverse<Timestamp>, bool, u64, EntityId) {
        match (entity.created_at, self.placeholders.get(&entity.id)) {
            (Some(created), _) => (Reverse(created), false, 0, entity.id.clone()),
            (None, Some(p)) => (Reverse(p.received_at), true, p.seq, entity.id.clone()),
            (None, None) => (Reverse(Timestamp::from_millis(0)), true, u64::MAX, entity.id.clone()),
        }
    }
}

fn to_entities(documents: Vec<RemoteDocument>) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::with_capacity(documents.len());
    for document in documents {
        let raw_id = document.id.clone();
        match document.into_entity() {
            Ok(entity) => entities.push(entity),
            Err(err) => warn!(id = %raw_id, error = %err, "skipping document with invalid id"),
        }
    }
    dedupe_by_id(entities)
}

fn fold_settings(documents: Vec<RemoteDocument>) -> Map<String, serde_json::Value> {
    let mut settings = Map::new();
    for document in documents {
        settings.extend(document.data);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, created: Option<u64>) -> RemoteDocument {
        let mut data = Map::new();
        data.insert("content".into(), json!(id));
        let mut doc = RemoteDocument::new(id, data);
        doc.create_time = created.map(Timestamp::from_millis);
        doc
    }

    fn ids(collection: &Collection) -> Vec<&str> {
        collection
            .as_list()
            .unwrap()
            .iter()
            .map(|e| e.id.as_str())
            .collect()
    }

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn insertion_order_is_payload_order() {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::Insertion);
        let value = adapter.materialize(vec![doc("b", Some(1)), doc("a", Some(5))], at(10));
        assert_eq!(ids(&value), ["b", "a"]);
    }

    #[test]
    fn created_desc_with_id_tiebreak() {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::CreatedDesc);
        let value = adapter.materialize(
            vec![doc("k2", Some(100)), doc("k1", Some(300)), doc("k3", Some(100))],
            at(1_000),
        );
        assert_eq!(ids(&value), ["k1", "k2", "k3"]);
    }

    #[test]
    fn pending_entities_sort_by_receipt() {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::CreatedDesc);

        let value = adapter.materialize(
            vec![doc("old", Some(100)), doc("p1", None), doc("p0", None)],
            at(500),
        );
        assert_eq!(ids(&value), ["p1", "p0", "old"]);
        assert!(value.as_list().unwrap()[0].created_at.is_none());
        assert_eq!(adapter.pending_count(), 2);

        // A later pending entity sorts above the earlier ones; earlier
        // placeholders keep their first receipt time.
        let value = adapter.materialize(
            vec![doc("old", Some(100)), doc("p1", None), doc("p0", None), doc("p2", None)],
            at(900),
        );
        assert_eq!(ids(&value), ["p2", "p1", "p0", "old"]);
        assert_eq!(adapter.placeholder(&EntityId::new("p1").unwrap()), Some(at(500)));
    }

    #[test]
    fn authoritative_timestamp_replaces_placeholder() {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::CreatedDesc);
        adapter.materialize(vec![doc("new", None), doc("old", Some(100))], at(500));

        let value = adapter.materialize(vec![doc("new", Some(50)), doc("old", Some(100))], at(600));
        assert_eq!(ids(&value), ["old", "new"]);
        assert_eq!(adapter.pending_count(), 0);
        assert!(adapter.placeholder(&EntityId::new("new").unwrap()).is_none());
    }

    #[test]
    fn resolved_sorts_before_placeholder_at_same_time() {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::CreatedDesc);
        let value = adapter.materialize(vec![doc("p", None), doc("r", Some(500))], at(500));
        assert_eq!(ids(&value), ["r", "p"]);
    }

    #[test]
    fn invalid_and_duplicate_ids() {
        let mut adapter = SubscriptionAdapter::new(CollectionKind::List, CollectionOrder::Insertion);
        let mut second = doc("a", Some(9));
        second.data.insert("content".into(), json!("later"));

        let value = adapter.materialize(vec![doc("a", Some(1)), doc("x/y", None), doc("b", None), second], at(0));
        assert_eq!(ids(&value), ["a", "b"]);
        assert_eq!(value.as_list().unwrap()[0].str_field("content"), Some("later"));
    }

    #[test]
    fn settings_fold_key_by_key() {
        let spec = CollectionSpec::settings("theme");
        let mut adapter = SubscriptionAdapter::for_spec(&spec);

        let mut first = Map::new();
        first.insert("primaryColor".into(), json!("#003366"));
        first.insert("font".into(), json!("serif"));
        let mut second = Map::new();
        second.insert("font".into(), json!("sans"));

        let value = adapter.materialize(
            vec![RemoteDocument::new("main", first), RemoteDocument::new("overrides", second)],
            at(0),
        );
        let settings = value.as_settings().unwrap();
        assert_eq!(settings.get("primaryColor"), Some(&json!("#003366")));
        assert_eq!(settings.get("font"), Some(&json!("sans")));
    }
}
