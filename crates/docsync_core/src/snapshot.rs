//! Per-partition snapshots.

use crate::collection::Collection;
use crate::entity::Entity;
use crate::ids::PartitionKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Named collections of one partition, keyed by collection name.
///
/// Also used for incoming partial updates: collections missing from the map
/// are "absent" for the merge rules.
pub type PartitionData = BTreeMap<String, Collection>;

/// The complete in-memory mirror of one partition's remote data.
///
/// Snapshots are values: every mutation in this crate returns a new snapshot
/// and leaves the input untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Partition this snapshot mirrors.
    pub partition: PartitionKey,
    /// Collections by name.
    #[serde(default)]
    pub collections: PartitionData,
}

impl Snapshot {
    /// Creates an empty snapshot for a partition.
    #[must_use]
    pub fn empty(partition: PartitionKey) -> Self {
        Self {
            partition,
            collections: PartitionData::new(),
        }
    }

    /// Creates a snapshot from existing collections.
    #[must_use]
    pub fn with_collections(partition: PartitionKey, collections: PartitionData) -> Self {
        Self {
            partition,
            collections,
        }
    }

    /// Returns a collection by name.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Returns the entities of a list collection, or an empty slice.
    pub fn list(&self, name: &str) -> &[Entity] {
        self.collections
            .get(name)
            .and_then(Collection::as_list)
            .unwrap_or(&[])
    }

    /// Returns the settings object of a settings collection.
    pub fn settings(&self, name: &str) -> Option<&Map<String, Value>> {
        self.collections.get(name).and_then(Collection::as_settings)
    }

    /// Returns true if no collection holds data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.values().all(Collection::is_empty)
    }

    /// Total number of entities across list collections.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.collections
            .values()
            .filter_map(Collection::as_list)
            .map(<[Entity]>::len)
            .sum()
    }
}
