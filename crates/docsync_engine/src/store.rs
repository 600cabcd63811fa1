//! Remote document store abstraction.

use crate::error::SyncResult;
use async_trait::async_trait;
use docsync_core::{CoreResult, Entity, EntityId, PartitionKey, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A document as the remote store reports it.
///
/// Ids are raw strings here; they are validated when the adapter turns the
/// document into an [`Entity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    /// Document id.
    pub id: String,
    /// Document fields.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Server-assigned creation time; `None` while still pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<Timestamp>,
    /// Server-assigned update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<Timestamp>,
}

impl RemoteDocument {
    /// Creates a document without timestamps.
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
            create_time: None,
            update_time: None,
        }
    }

    /// Converts the document into an entity, validating its id.
    pub fn into_entity(self) -> CoreResult<Entity> {
        Ok(Entity {
            id: EntityId::new(self.id)?,
            fields: self.data,
            created_at: self.create_time,
            updated_at: self.update_time,
        })
    }
}

impl From<Entity> for RemoteDocument {
    fn from(entity: Entity) -> Self {
        Self {
            id: entity.id.into(),
            data: entity.fields,
            create_time: entity.created_at,
            update_time: entity.updated_at,
        }
    }
}

/// A push notification from the store.
#[derive(Debug)]
pub enum RemoteEvent {
    /// The full current contents of the subscribed collection.
    Documents(Vec<RemoteDocument>),
    /// The subscription failed (for example, permission denied).
    Failed(crate::error::SyncError),
}

/// Handler invoked by the store for every push notification.
pub type ChangeHandler = Arc<dyn Fn(RemoteEvent) + Send + Sync>;

/// A live registration with the store.
pub trait RemoteSubscription: Send + Sync {
    /// Stops delivery. Calling it more than once has no effect.
    fn cancel(&self);
}

impl fmt::Debug for dyn RemoteSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemoteSubscription")
    }
}

/// What a local write does to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Create or replace the entity.
    Upsert,
    /// Remove the entity.
    Delete,
}

/// A hosted document database, partitioned by key.
///
/// Implementations own their retry and timeout policy; the engine never
/// retries on its own.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetches every document of a collection.
    ///
    /// Fails with `NotFound` for an unknown partition and `Transient` on an
    /// availability failure.
    async fn fetch_all(
        &self,
        partition: &PartitionKey,
        collection: &str,
    ) -> SyncResult<Vec<RemoteDocument>>;

    /// Registers a push listener.
    ///
    /// The handler receives the full current sequence on every change. A
    /// permission failure is delivered to the handler as
    /// [`RemoteEvent::Failed`].
    async fn subscribe(
        &self,
        partition: &PartitionKey,
        collection: &str,
        handler: ChangeHandler,
    ) -> SyncResult<Box<dyn RemoteSubscription>>;

    /// Creates or replaces a document.
    async fn put(&self, partition: &PartitionKey, collection: &str, entity: &Entity)
        -> SyncResult<()>;

    /// Deletes a document. Deleting a missing id succeeds.
    async fn delete(&self, partition: &PartitionKey, collection: &str, id: &EntityId)
        -> SyncResult<()>;
}
