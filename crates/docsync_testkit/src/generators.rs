//! Property-based test generators using proptest.
//!
//! Provides strategies for generating snapshots and partial updates that
//! keep the model invariants: unique ids within a list, and a fixed kind per
//! collection name.

use docsync_core::{Collection, Entity, EntityId, PartitionData, PartitionKey, Snapshot, Timestamp};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Collection names that always hold entity lists.
pub const LIST_COLLECTIONS: [&str; 3] = ["courses", "posts", "clips"];

/// Collection names that always hold settings objects.
pub const SETTINGS_COLLECTIONS: [&str; 2] = ["theme", "contact"];

/// Strategy for generating valid entity ids.
///
/// Drawn from a small alphabet so that generated lists collide on ids often.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::string::string_regex("[a-f][0-9]{0,2}")
        .expect("Invalid regex")
        .prop_map(|s| EntityId::new(s).expect("generated id is valid"))
}

/// Strategy for generating scalar JSON values, blank ones included.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Null),
        1 => Just(Value::String(String::new())),
        4 => "[a-z ]{1,12}".prop_map(Value::String),
        2 => any::<i32>().prop_map(Value::from),
        1 => any::<bool>().prop_map(Value::Bool),
    ]
}

/// Strategy for generating a settings object.
pub fn settings_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,6}", field_value_strategy(), 0..5)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// Strategy for generating an entity.
pub fn entity_strategy() -> impl Strategy<Value = Entity> {
    (
        entity_id_strategy(),
        settings_strategy(),
        prop::option::of(0u64..1_000_000),
    )
        .prop_map(|(id, fields, created)| Entity {
            id,
            fields,
            created_at: created.map(Timestamp::from_millis),
            updated_at: None,
        })
}

/// Strategy for generating an entity list with unique ids.
pub fn entity_list_strategy(max_len: usize) -> impl Strategy<Value = Vec<Entity>> {
    prop::collection::vec(entity_strategy(), 0..max_len).prop_map(|entities| {
        let mut unique: Vec<Entity> = Vec::with_capacity(entities.len());
        for entity in entities {
            if !unique.iter().any(|e| e.id == entity.id) {
                unique.push(entity);
            }
        }
        unique
    })
}

/// Strategy for generating an entity list in which ids repeat.
///
/// Mirrors raw store payloads and locally persisted data, which are not
/// deduplicated.
pub fn entity_list_with_duplicates_strategy(max_len: usize) -> impl Strategy<Value = Vec<Entity>> {
    prop::collection::vec(entity_strategy(), 0..max_len)
}

/// Strategy for generating partial partition data.
///
/// Each known collection is independently absent, empty or populated, so
/// stale-read cases show up frequently.
pub fn partition_data_strategy() -> impl Strategy<Value = PartitionData> {
    let lists = prop::collection::vec(prop::option::of(entity_list_strategy(6)), 3);
    let settings = prop::collection::vec(prop::option::of(settings_strategy()), 2);

    (lists, settings).prop_map(|(lists, settings)| {
        let mut data = PartitionData::new();
        for (name, value) in LIST_COLLECTIONS.iter().zip(lists) {
            if let Some(items) = value {
                data.insert((*name).to_string(), Collection::List(items));
            }
        }
        for (name, value) in SETTINGS_COLLECTIONS.iter().zip(settings) {
            if let Some(map) = value {
                data.insert((*name).to_string(), Collection::Settings(map));
            }
        }
        data
    })
}

/// Strategy for generating a full snapshot of partition `en`.
pub fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    partition_data_strategy().prop_map(|collections| {
        Snapshot::with_collections(
            PartitionKey::new("en").expect("static key is valid"),
            collections,
        )
    })
}

/// A local write generated for sequence tests.
#[derive(Debug, Clone)]
pub enum WriteOperation {
    /// Upsert an entity.
    Upsert(Entity),
    /// Delete an entity by id.
    Delete(EntityId),
}

/// Strategy for generating local writes.
pub fn write_operation_strategy() -> impl Strategy<Value = WriteOperation> {
    prop_oneof![
        3 => entity_strategy().prop_map(WriteOperation::Upsert),
        1 => entity_id_strategy().prop_map(WriteOperation::Delete),
    ]
}

/// Strategy for generating a sequence of local writes.
pub fn write_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<WriteOperation>> {
    prop::collection::vec(write_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_lists_have_unique_ids(items in entity_list_strategy(10)) {
            let mut ids: Vec<_> = items.iter().map(|e| e.id.clone()).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), items.len());
        }

        #[test]
        fn generated_kinds_follow_names(data in partition_data_strategy()) {
            for (name, collection) in &data {
                let is_list = LIST_COLLECTIONS.contains(&name.as_str());
                prop_assert_eq!(collection.as_list().is_some(), is_list);
            }
        }
    }
}
