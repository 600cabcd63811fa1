//! Configuration for the sync engine.

use crate::auth::Identity;
use crate::error::{SyncError, SyncResult};
use docsync_core::{validate_collection_name, CollectionKind, MergePolicy, PartitionKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default capacity of the engine event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Ordering applied to a list collection on every materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionOrder {
    /// Payload order as delivered by the store.
    #[default]
    Insertion,
    /// Newest first by creation timestamp; ties broken by id ascending.
    CreatedDesc,
}

/// A collection the engine fetches for every partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Collection shape.
    pub kind: CollectionKind,
    /// Ordering for list collections.
    #[serde(default)]
    pub order: CollectionOrder,
}

impl CollectionSpec {
    /// A list collection kept in insertion order.
    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::List,
            order: CollectionOrder::Insertion,
        }
    }

    /// A list collection ordered newest first (clips, submissions).
    pub fn time_series(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::List,
            order: CollectionOrder::CreatedDesc,
        }
    }

    /// A settings collection (theme, contact info).
    pub fn settings(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Settings,
            order: CollectionOrder::Insertion,
        }
    }
}

/// Maps a signed-in identity to the partitions the engine should hold.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionSelector {
    /// One partition named after the user id.
    #[default]
    Uid,
    /// A fixed set of partitions, held only while someone is signed in.
    Fixed(Vec<PartitionKey>),
}

impl PartitionSelector {
    /// Returns the partitions for an identity.
    pub fn select(&self, identity: &Identity) -> SyncResult<Vec<PartitionKey>> {
        match self {
            PartitionSelector::Uid => Ok(vec![PartitionKey::new(identity.uid.as_str())?]),
            PartitionSelector::Fixed(keys) => Ok(keys.clone()),
        }
    }
}

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Collections fetched on initialize and refresh.
    pub collections: Vec<CollectionSpec>,
    /// Policy used to fold fetches into snapshots.
    pub merge_policy: MergePolicy,
    /// Capacity of the broadcast event channel.
    pub event_capacity: usize,
    /// Identity to partition mapping used by auth integration.
    pub partition_selector: PartitionSelector,
}

impl EngineConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self {
            collections: Vec::new(),
            merge_policy: MergePolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            partition_selector: PartitionSelector::default(),
        }
    }

    /// Adds a collection.
    #[must_use]
    pub fn with_collection(mut self, spec: CollectionSpec) -> Self {
        self.collections.push(spec);
        self
    }

    /// Sets the merge policy.
    #[must_use]
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the partition selector.
    #[must_use]
    pub fn with_partition_selector(mut self, selector: PartitionSelector) -> Self {
        self.partition_selector = selector;
        self
    }

    /// Looks up a configured collection.
    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Checks collection names and the event capacity.
    pub fn validate(&self) -> SyncResult<()> {
        if self.event_capacity == 0 {
            return Err(SyncError::validation("event capacity must be at least 1"));
        }
        let mut seen = HashSet::new();
        for spec in &self.collections {
            validate_collection_name(&spec.name)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(SyncError::validation(format!(
                    "collection {} configured twice",
                    spec.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
