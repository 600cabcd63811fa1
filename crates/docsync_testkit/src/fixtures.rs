//! Test fixtures and snapshot helpers.
//!
//! Provides short constructors for the records that show up in the
//! scenarios: academy courses, clipboard clips, custom tags and theme
//! settings.

use docsync_core::{Collection, Entity, EntityId, PartitionData, PartitionKey, Snapshot, Timestamp};
use serde_json::{Map, Value};

/// Creates a partition key, panicking on invalid input.
pub fn partition(key: &str) -> PartitionKey {
    PartitionKey::new(key).expect("Invalid partition key")
}

/// Creates an entity id, panicking on invalid input.
pub fn id(value: &str) -> EntityId {
    EntityId::new(value).expect("Invalid entity id")
}

/// Creates a course entity with a title.
pub fn course(id_value: &str, title: &str) -> Entity {
    Entity::new(id(id_value)).with_field("title", title)
}

/// Creates a clipboard clip, optionally with a server timestamp.
pub fn clip(id_value: &str, content: &str, created_millis: Option<u64>) -> Entity {
    let mut entity = Entity::new(id(id_value)).with_field("content", content);
    entity.created_at = created_millis.map(Timestamp::from_millis);
    entity
}

/// Creates a custom-tag entity; the tag name is the id.
pub fn tag(name: &str) -> Entity {
    Entity::new(id(name)).with_field("label", name)
}

/// Builds a settings map from a JSON object literal.
///
/// Non-object values produce an empty map.
pub fn settings(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Incremental builder for snapshots and partial updates.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    data: PartitionData,
}

impl SnapshotBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a list collection.
    #[must_use]
    pub fn list(mut self, name: &str, items: Vec<Entity>) -> Self {
        self.data.insert(name.to_string(), Collection::List(items));
        self
    }

    /// Adds a settings collection.
    #[must_use]
    pub fn settings(mut self, name: &str, value: Value) -> Self {
        self.data
            .insert(name.to_string(), Collection::Settings(settings(value)));
        self
    }

    /// Returns the collected partition data.
    pub fn data(self) -> PartitionData {
        self.data
    }

    /// Builds a snapshot for the given partition.
    pub fn build(self, key: &str) -> Snapshot {
        Snapshot::with_collections(partition(key), self.data)
    }
}

/// Returns the ids of a snapshot list, in order.
pub fn ids_of(snapshot: &Snapshot, collection: &str) -> Vec<String> {
    snapshot
        .list(collection)
        .iter()
        .map(|e| e.id.as_str().to_string())
        .collect()
}
