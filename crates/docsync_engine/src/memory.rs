//! In-memory remote store for tests and demos.

use crate::clock::{Clock, SystemClock};
use crate::error::{SyncError, SyncResult};
use crate::store::{ChangeHandler, RemoteDocument, RemoteEvent, RemoteStore, RemoteSubscription};
use async_trait::async_trait;
use docsync_core::{Entity, EntityId, PartitionKey, Timestamp};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `fetch_all`.
    Fetch,
    /// `subscribe`.
    Subscribe,
    /// `put`.
    Put,
    /// `delete`.
    Delete,
}

type Collections = BTreeMap<String, Vec<RemoteDocument>>;

struct Subscriber {
    id: u64,
    partition: PartitionKey,
    collection: String,
    handler: ChangeHandler,
}

#[derive(Default)]
struct StoreState {
    partitions: BTreeMap<PartitionKey, Collections>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    offline: bool,
    stale_reads: bool,
    defer_timestamps: bool,
    denied: HashSet<(PartitionKey, String)>,
    failures: HashMap<StoreOp, VecDeque<SyncError>>,
}

impl StoreState {
    /// Runs the failure checks shared by every operation.
    fn check(&mut self, op: StoreOp, partition: &PartitionKey, collection: &str) -> SyncResult<()> {
        if let Some(err) = self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if self.offline {
            return Err(SyncError::transient("store unavailable"));
        }
        if !self.partitions.contains_key(partition) {
            return Err(SyncError::partition_not_found(partition));
        }
        if op != StoreOp::Subscribe && self.is_denied(partition, collection) {
            return Err(SyncError::permission(
                partition,
                collection,
                "missing or insufficient permissions",
            ));
        }
        Ok(())
    }

    fn is_denied(&self, partition: &PartitionKey, collection: &str) -> bool {
        self.denied
            .contains(&(partition.clone(), collection.to_string()))
    }

    fn documents(&self, partition: &PartitionKey, collection: &str) -> Vec<RemoteDocument> {
        self.partitions
            .get(partition)
            .and_then(|c| c.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    fn collection_mut(&mut self, partition: &PartitionKey, collection: &str) -> &mut Vec<RemoteDocument> {
        self.partitions
            .entry(partition.clone())
            .or_default()
            .entry(collection.to_string())
            .or_default()
    }

    /// Handlers to notify for a collection, paired with its current contents.
    fn pending_delivery(&self, partition: &PartitionKey, collection: &str) -> Option<(Vec<ChangeHandler>, Vec<RemoteDocument>)> {
        if self.is_denied(partition, collection) {
            return None;
        }
        let handlers: Vec<ChangeHandler> = self
            .subscribers
            .iter()
            .filter(|s| &s.partition == partition && s.collection == collection)
            .map(|s| Arc::clone(&s.handler))
            .collect();
        if handlers.is_empty() {
            return None;
        }
        Some((handlers, self.documents(partition, collection)))
    }
}

struct StoreShared {
    state: Mutex<StoreState>,
    // Serializes mutations with their notifications so subscribers observe
    // changes in commit order. Reentrant: a handler may seed the store.
    delivery: ReentrantMutex<()>,
    clock: Arc<dyn Clock>,
}

impl StoreShared {
    /// Applies a mutation and notifies the collection's subscribers.
    fn mutate<T>(
        &self,
        partition: &PartitionKey,
        collection: &str,
        f: impl FnOnce(&mut StoreState, Timestamp) -> SyncResult<T>,
    ) -> SyncResult<T> {
        let _delivery = self.delivery.lock();
        let result = f(&mut self.state.lock(), self.clock.now())?;
        self.notify(partition, collection);
        Ok(result)
    }

    /// Pushes the current contents of a collection to its subscribers.
    ///
    /// Callers hold the delivery lock. Handlers run after the state lock is
    /// released.
    fn notify(&self, partition: &PartitionKey, collection: &str) {
        let delivery = self.state.lock().pending_delivery(partition, collection);
        if let Some((handlers, documents)) = delivery {
            deliver(&handlers, &documents);
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.state.lock().subscribers.retain(|s| s.id != id);
    }
}

fn deliver(handlers: &[ChangeHandler], documents: &[RemoteDocument]) {
    for handler in handlers {
        handler(RemoteEvent::Documents(documents.to_vec()));
    }
}

/// An in-memory document store.
///
/// Assigns server timestamps, pushes the full collection to subscribers on
/// every change and supports failure injection. Clones share the same data.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    shared: Arc<StoreShared>,
}

impl MemoryRemoteStore {
    /// Creates an empty store using wall-clock timestamps.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store with the given timestamp source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                state: Mutex::new(StoreState::default()),
                delivery: ReentrantMutex::new(()),
                clock,
            }),
        }
    }

    /// Makes a partition known to the store.
    pub fn create_partition(&self, partition: &PartitionKey) {
        self.shared
            .state
            .lock()
            .partitions
            .entry(partition.clone())
            .or_default();
    }

    /// Writes entities as-is, timestamps included, creating the partition if
    /// needed.
    pub fn seed(&self, partition: &PartitionKey, collection: &str, entities: impl IntoIterator<Item = Entity>) {
        let _delivery = self.shared.delivery.lock();
        {
            let mut state = self.shared.state.lock();
            let docs = state.collection_mut(partition, collection);
            for document in entities.into_iter().map(RemoteDocument::from) {
                match docs.iter().position(|d| d.id == document.id) {
                    Some(index) => docs[index] = document,
                    None => docs.push(document),
                }
            }
        }
        self.shared.notify(partition, collection);
    }

    /// Removes every document of a collection.
    pub fn clear(&self, partition: &PartitionKey, collection: &str) {
        let _delivery = self.shared.delivery.lock();
        self.shared
            .state
            .lock()
            .collection_mut(partition, collection)
            .clear();
        self.shared.notify(partition, collection);
    }

    /// Returns the stored documents of a collection.
    pub fn documents(&self, partition: &PartitionKey, collection: &str) -> Vec<RemoteDocument> {
        self.shared.state.lock().documents(partition, collection)
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().subscribers.len()
    }

    /// Makes every operation fail with a transient error.
    pub fn set_offline(&self, offline: bool) {
        self.shared.state.lock().offline = offline;
    }

    /// Makes fetches succeed with no documents, as a partial outage does.
    pub fn set_stale_reads(&self, stale: bool) {
        self.shared.state.lock().stale_reads = stale;
    }

    /// Denies access to one collection of a partition.
    pub fn deny(&self, partition: &PartitionKey, collection: &str) {
        self.shared
            .state
            .lock()
            .denied
            .insert((partition.clone(), collection.to_string()));
    }

    /// Restores access to a collection.
    pub fn allow(&self, partition: &PartitionKey, collection: &str) {
        self.shared
            .state
            .lock()
            .denied
            .remove(&(partition.clone(), collection.to_string()));
    }

    /// Fails the next call of `op` with `error`.
    pub fn fail_next(&self, op: StoreOp, error: SyncError) {
        self.shared
            .state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Leaves creation timestamps of new documents pending until
    /// [`resolve_pending_timestamps`](Self::resolve_pending_timestamps).
    pub fn set_defer_timestamps(&self, defer: bool) {
        self.shared.state.lock().defer_timestamps = defer;
    }

    /// Assigns the current time to every pending document and notifies the
    /// affected subscribers. Returns the number of documents resolved.
    pub fn resolve_pending_timestamps(&self) -> usize {
        let _delivery = self.shared.delivery.lock();
        let now = self.shared.clock.now();
        let (resolved, deliveries) = {
            let mut state = self.shared.state.lock();
            let mut resolved = 0;
            let mut touched = Vec::new();
            for (partition, collections) in &mut state.partitions {
                for (name, docs) in collections.iter_mut() {
                    let mut changed = false;
                    for doc in docs.iter_mut().filter(|d| d.create_time.is_none()) {
                        doc.create_time = Some(now);
                        doc.update_time = Some(now);
                        resolved += 1;
                        changed = true;
                    }
                    if changed {
                        touched.push((partition.clone(), name.clone()));
                    }
                }
            }
            let deliveries: Vec<_> = touched
                .iter()
                .filter_map(|(p, c)| state.pending_delivery(p, c))
                .collect();
            (resolved, deliveries)
        };
        for (handlers, documents) in deliveries {
            deliver(&handlers, &documents);
        }
        resolved
    }

    fn fetch_now(&self, partition: &PartitionKey, collection: &str) -> SyncResult<Vec<RemoteDocument>> {
        let mut state = self.shared.state.lock();
        state.check(StoreOp::Fetch, partition, collection)?;
        if state.stale_reads {
            return Ok(Vec::new());
        }
        Ok(state.documents(partition, collection))
    }

    fn subscribe_now(
        &self,
        partition: &PartitionKey,
        collection: &str,
        handler: ChangeHandler,
    ) -> SyncResult<MemorySubscription> {
        let _delivery = self.shared.delivery.lock();
        let (id, initial) = {
            let mut state = self.shared.state.lock();
            state.check(StoreOp::Subscribe, partition, collection)?;
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            state.subscribers.push(Subscriber {
                id,
                partition: partition.clone(),
                collection: collection.to_string(),
                handler: Arc::clone(&handler),
            });
            let initial = if state.is_denied(partition, collection) {
                RemoteEvent::Failed(SyncError::permission(
                    partition,
                    collection,
                    "missing or insufficient permissions",
                ))
            } else {
                RemoteEvent::Documents(state.documents(partition, collection))
            };
            (id, initial)
        };
        debug!(subscriber = id, %partition, collection, "memory store subscription opened");
        handler(initial);
        Ok(MemorySubscription {
            shared: Arc::downgrade(&self.shared),
            id,
        })
    }

    fn put_now(&self, partition: &PartitionKey, collection: &str, entity: &Entity) -> SyncResult<()> {
        self.shared.mutate(partition, collection, |state, now| {
            state.check(StoreOp::Put, partition, collection)?;
            let defer = state.defer_timestamps;
            let docs = state.collection_mut(partition, collection);
            match docs.iter_mut().find(|d| d.id == entity.id.as_str()) {
                Some(existing) => {
                    existing.data = entity.fields.clone();
                    if existing.create_time.is_some() {
                        existing.update_time = Some(now);
                    }
                }
                None => {
                    let mut doc = RemoteDocument::new(entity.id.as_str(), entity.fields.clone());
                    if !defer {
                        doc.create_time = Some(now);
                        doc.update_time = Some(now);
                    }
                    docs.push(doc);
                }
            }
            Ok(())
        })
    }

    fn delete_now(&self, partition: &PartitionKey, collection: &str, id: &EntityId) -> SyncResult<()> {
        self.shared.mutate(partition, collection, |state, _| {
            state.check(StoreOp::Delete, partition, collection)?;
            state
                .collection_mut(partition, collection)
                .retain(|d| d.id != id.as_str());
            Ok(())
        })
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_all(&self, partition: &PartitionKey, collection: &str) -> SyncResult<Vec<RemoteDocument>> {
        self.fetch_now(partition, collection)
    }

    async fn subscribe(
        &self,
        partition: &PartitionKey,
        collection: &str,
        handler: ChangeHandler,
    ) -> SyncResult<Box<dyn RemoteSubscription>> {
        let subscription = self.subscribe_now(partition, collection, handler)?;
        Ok(Box::new(subscription))
    }

    async fn put(&self, partition: &PartitionKey, collection: &str, entity: &Entity) -> SyncResult<()> {
        self.put_now(partition, collection, entity)
    }

    async fn delete(&self, partition: &PartitionKey, collection: &str, id: &EntityId) -> SyncResult<()> {
        self.delete_now(partition, collection, id)
    }
}

/// Registration handle returned by [`MemoryRemoteStore`].
struct MemorySubscription {
    shared: Weak<StoreShared>,
    id: u64,
}

impl RemoteSubscription for MemorySubscription {
    fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.unsubscribe(self.id);
        }
    }
}
