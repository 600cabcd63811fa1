//! Stored records.

use crate::ids::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single stored record.
///
/// Entities always carry a stable id. Timestamps are assigned by the remote
/// store; a missing `created_at` means the server timestamp is still pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique id within its collection.
    pub id: EntityId,
    /// Application fields (title, content, tags, media URLs...).
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Creation time assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Last update time assigned by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl Entity {
    /// Creates an entity with no fields and no timestamps.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            fields: Map::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Sets a field, returning the entity.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets the creation timestamp, returning the entity.
    #[must_use]
    pub fn with_created_at(mut self, at: Timestamp) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Sets a field in place.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns a field as a string slice, if it is a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Returns true if the store has not assigned a creation time yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.created_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_and_accessors() {
        let entity = Entity::new(EntityId::new("c1").unwrap())
            .with_field("title", "Logic")
            .with_field("weeks", 8);

        assert_eq!(entity.str_field("title"), Some("Logic"));
        assert_eq!(entity.field("weeks"), Some(&json!(8)));
        assert!(entity.is_pending());
        assert!(!entity
            .with_created_at(Timestamp::from_millis(5))
            .is_pending());
    }

    #[test]
    fn json_shape() {
        let entity: Entity = serde_json::from_value(json!({
            "id": "clip-1",
            "fields": {"content": "hello"},
            "createdAt": 1700000000000u64
        }))
        .unwrap();

        assert_eq!(entity.id.as_str(), "clip-1");
        assert_eq!(entity.created_at, Some(Timestamp::from_millis(1_700_000_000_000)));
        assert_eq!(entity.updated_at, None);

        let value = serde_json::to_value(&entity).unwrap();
        assert!(value.get("updatedAt").is_none());
    }
}
