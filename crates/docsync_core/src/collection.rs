//! Named collections inside a snapshot.

use crate::entity::Entity;
use crate::ids::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Shape of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Ordered sequence of entities keyed by id.
    List,
    /// Singleton keyed configuration object.
    Settings,
}

impl CollectionKind {
    /// Returns the lowercase kind name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Settings => "settings",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One named collection: either an entity list or a settings object.
///
/// Serialized untagged, so JSON arrays become lists and JSON objects become
/// settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Collection {
    /// Ordered entities with unique ids.
    List(Vec<Entity>),
    /// Keyed configuration values.
    Settings(Map<String, Value>),
}

impl Collection {
    /// Creates an empty collection of the given kind.
    #[must_use]
    pub fn empty(kind: CollectionKind) -> Self {
        match kind {
            CollectionKind::List => Collection::List(Vec::new()),
            CollectionKind::Settings => Collection::Settings(Map::new()),
        }
    }

    /// Returns the collection kind.
    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        match self {
            Collection::List(_) => CollectionKind::List,
            Collection::Settings(_) => CollectionKind::Settings,
        }
    }

    /// Returns true if the collection holds no usable data.
    ///
    /// A settings object whose values are all blank counts as empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Collection::List(items) => items.is_empty(),
            Collection::Settings(map) => map.values().all(is_blank),
        }
    }

    /// Number of entities (lists) or non-blank keys (settings).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Collection::List(items) => items.len(),
            Collection::Settings(map) => map.values().filter(|v| !is_blank(v)).count(),
        }
    }

    /// Returns the entities if this is a list.
    pub fn as_list(&self) -> Option<&[Entity]> {
        match self {
            Collection::List(items) => Some(items),
            Collection::Settings(_) => None,
        }
    }

    /// Returns the settings object if this is a settings collection.
    pub fn as_settings(&self) -> Option<&Map<String, Value>> {
        match self {
            Collection::Settings(map) => Some(map),
            Collection::List(_) => None,
        }
    }

    /// Finds an entity by id.
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.as_list()
            .and_then(|items| items.iter().find(|e| &e.id == id))
    }

    /// Returns the position of an entity in a list.
    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.as_list()
            .and_then(|items| items.iter().position(|e| &e.id == id))
    }

    /// Collapses repeated ids in a list; see [`dedupe_by_id`].
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Collection::List(items) => Collection::List(dedupe_by_id(items)),
            settings @ Collection::Settings(_) => settings,
        }
    }
}

/// Removes repeated ids from an entity list.
///
/// A repeated id keeps the position of its first occurrence and the contents
/// of its last.
#[must_use]
pub fn dedupe_by_id(items: Vec<Entity>) -> Vec<Entity> {
    let mut unique: Vec<Entity> = Vec::with_capacity(items.len());
    for entity in items {
        match unique.iter().position(|e| e.id == entity.id) {
            Some(index) => unique[index] = entity,
            None => unique.push(entity),
        }
    }
    unique
}

/// Returns true for JSON values that the merge rules treat as absent:
/// `null`, `""`, `[]` and `{}`.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str) -> Entity {
        Entity::new(EntityId::new(id).unwrap())
    }

    #[test]
    fn dedupe_keeps_first_position_last_contents() {
        let items = vec![
            entity("c1").with_field("title", "A"),
            entity("c2"),
            entity("c1").with_field("title", "B"),
        ];
        let unique = dedupe_by_id(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].str_field("title"), Some("B"));
        assert_eq!(unique[1].id.as_str(), "c2");

        let settings = Collection::Settings(Map::new());
        assert_eq!(settings.clone().normalized(), settings);
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!({})));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!("x")));
    }

    #[test]
    fn emptiness() {
        assert!(Collection::empty(CollectionKind::List).is_empty());
        assert!(Collection::empty(CollectionKind::Settings).is_empty());

        let blank_settings: Map<String, Value> =
            serde_json::from_value(json!({"primaryColor": "", "logo": null})).unwrap();
        assert!(Collection::Settings(blank_settings).is_empty());

        let list = Collection::List(vec![entity("a"), entity("b")]);
        assert!(!list.is_empty());
        assert_eq!(list.len(), 2);
        assert_eq!(list.position(&EntityId::new("b").unwrap()), Some(1));
        assert!(list.get(&EntityId::new("z").unwrap()).is_none());
    }

    #[test]
    fn untagged_json() {
        let list: Collection = serde_json::from_value(json!([{"id": "c1"}])).unwrap();
        assert_eq!(list.kind(), CollectionKind::List);

        let settings: Collection =
            serde_json::from_value(json!({"primaryColor": "#003366"})).unwrap();
        assert_eq!(settings.kind(), CollectionKind::Settings);
        assert_eq!(settings.len(), 1);
    }
}
