//! The sync engine.
//!
//! ## Locking
//!
//! Partition slots live behind one `parking_lot` lock. It is never held
//! across an `.await`, while calling into the store, or while running a
//! user callback, so readers always see a whole snapshot.
//!
//! ## Generations
//!
//! Every partition slot gets a fresh generation number when it is created.
//! Fetch results, subscription deliveries and confirmed writes carry the
//! generation they started under and are dropped if the partition was torn
//! down in the meantime.

use crate::adapter::SubscriptionAdapter;
use crate::auth::{AuthProvider, AuthWatch, Identity};
use crate::blob::BlobStore;
use crate::cache::SnapshotCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{CollectionSpec, EngineConfig};
use crate::error::{SyncError, SyncResult};
use crate::state::{
    EngineEvent, EngineStats, ErrorReport, PartitionState, RefreshOutcome, UpdateSource,
};
use crate::store::{ChangeHandler, RemoteDocument, RemoteEvent, RemoteStore, WriteMode};
use crate::subscription::{Subscription, SubscriptionInner};
use docsync_core::{
    validate_collection_name, Collection, CollectionKind, Entity, MergePolicy, PartitionData,
    PartitionKey, Snapshot,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

struct PartitionSlot {
    snapshot: Snapshot,
    state: PartitionState,
    generation: u64,
    last_error: Option<ErrorReport>,
    adapters: HashMap<String, SubscriptionAdapter>,
    subscriptions: Vec<Weak<SubscriptionInner>>,
}

impl PartitionSlot {
    fn new(partition: PartitionKey, generation: u64) -> Self {
        Self {
            snapshot: Snapshot::empty(partition),
            state: PartitionState::Uninitialized,
            generation,
            last_error: None,
            adapters: HashMap::new(),
            subscriptions: Vec::new(),
        }
    }

    fn adapter(&mut self, spec: &CollectionSpec) -> &mut SubscriptionAdapter {
        self.adapters
            .entry(spec.name.clone())
            .or_insert_with(|| SubscriptionAdapter::for_spec(spec))
    }

    /// Drops handles that were released or cancelled.
    fn prune_subscriptions(&mut self) {
        self.subscriptions
            .retain(|s| s.upgrade().is_some_and(|s| s.is_active()));
    }
}

struct EngineInner<S> {
    store: S,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn SnapshotCache>>,
    partitions: RwLock<BTreeMap<PartitionKey, PartitionSlot>>,
    stats: RwLock<EngineStats>,
    events: broadcast::Sender<EngineEvent>,
    generations: AtomicU64,
    identity_partitions: Mutex<Vec<PartitionKey>>,
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder<S: RemoteStore> {
    store: S,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn SnapshotCache>>,
}

impl<S: RemoteStore> SyncEngineBuilder<S> {
    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for receipt times.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persists snapshots to a cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validates the configuration and builds the engine.
    pub fn build(self) -> SyncResult<SyncEngine<S>> {
        self.config.validate()?;
        let (events, _) = broadcast::channel(self.config.event_capacity);
        Ok(SyncEngine {
            inner: Arc::new(EngineInner {
                store: self.store,
                config: self.config,
                clock: self.clock,
                cache: self.cache,
                partitions: RwLock::new(BTreeMap::new()),
                stats: RwLock::new(EngineStats::default()),
                events,
                generations: AtomicU64::new(0),
                identity_partitions: Mutex::new(Vec::new()),
            }),
        })
    }
}

/// Keeps one snapshot per partition convergent with a remote store.
///
/// Clones share the same state.
pub struct SyncEngine<S: RemoteStore> {
    inner: Arc<EngineInner<S>>,
}

impl<S: RemoteStore> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RemoteStore> SyncEngine<S> {
    /// Starts building an engine over a store.
    pub fn builder(store: S) -> SyncEngineBuilder<S> {
        SyncEngineBuilder {
            store,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            cache: None,
        }
    }

    /// Creates an engine with the system clock and no cache.
    pub fn new(store: S, config: EngineConfig) -> SyncResult<Self> {
        Self::builder(store).config(config).build()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Fetches every configured collection of each partition.
    ///
    /// A failed fetch keeps the partition's previous snapshot and records
    /// the error; the partition ends up `Ready` either way.
    pub async fn initialize<I>(&self, partitions: I) -> Vec<RefreshOutcome>
    where
        I: IntoIterator<Item = PartitionKey>,
    {
        let keys: BTreeSet<PartitionKey> = partitions.into_iter().collect();
        let mut outcomes = Vec::with_capacity(keys.len());
        for partition in &keys {
            let (outcome, _) = self.inner.load(partition, false).await;
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Re-fetches an initialized partition.
    pub async fn refresh(&self, partition: &PartitionKey) -> SyncResult<RefreshOutcome> {
        match self.inner.load(partition, true).await {
            (outcome, None) => Ok(outcome),
            (_, Some(err)) => Err(err),
        }
    }

    /// Registers a push listener on one collection of an initialized
    /// partition.
    ///
    /// Every delivery replaces the collection in the snapshot and then calls
    /// `on_change` with the new value. The store's first delivery usually
    /// arrives before this returns.
    pub async fn subscribe<F>(
        &self,
        partition: &PartitionKey,
        collection: &str,
        on_change: F,
    ) -> SyncResult<Subscription>
    where
        F: Fn(&Collection) + Send + Sync + 'static,
    {
        let spec = self.inner.collection_spec(partition, collection)?.clone();
        let generation = self.inner.initialized_generation(partition)?;
        let subscription = Arc::new(SubscriptionInner::new(partition.clone(), spec.name.clone()));

        let engine = Arc::downgrade(&self.inner);
        let handle = Arc::clone(&subscription);
        let key = partition.clone();
        let handler: ChangeHandler = Arc::new(move |event| {
            if !handle.is_active() {
                return;
            }
            let Some(engine) = engine.upgrade() else {
                return;
            };
            match event {
                RemoteEvent::Documents(documents) => {
                    if let Some(value) = engine.apply_push(&key, &spec, generation, documents) {
                        if handle.is_active() {
                            on_change(&value);
                        }
                    }
                }
                RemoteEvent::Failed(err) => {
                    engine.record_error(&key, Some(&spec.name), &err);
                }
            }
        });

        let remote = match self.inner.store.subscribe(partition, collection, handler).await {
            Ok(remote) => remote,
            Err(err) => {
                subscription.cancel();
                warn!(%partition, collection, error = %err, "subscribe failed");
                return Err(err);
            }
        };
        subscription.attach(remote);

        let registered = {
            let mut partitions = self.inner.partitions.write();
            match partitions.get_mut(partition) {
                Some(slot) if slot.generation == generation => {
                    slot.prune_subscriptions();
                    slot.subscriptions.push(Arc::downgrade(&subscription));
                    true
                }
                _ => false,
            }
        };
        if !registered {
            subscription.cancel();
            return Err(SyncError::partition_not_found(partition));
        }

        self.inner.stats.write().subscriptions_opened += 1;
        info!(%partition, collection, "subscribed");
        Ok(Subscription::new(subscription))
    }

    /// Writes an entity through to the store, then applies it locally.
    ///
    /// The snapshot changes only after the store confirms. Malformed input
    /// is rejected before any store call.
    pub async fn apply_local_write(
        &self,
        partition: &PartitionKey,
        collection: &str,
        entity: Entity,
        mode: WriteMode,
    ) -> SyncResult<()> {
        let id = entity.id.clone();
        let result = self
            .inner
            .write_through(partition, collection, entity, mode)
            .await;
        if let Err(err) = &result {
            self.inner.stats.write().writes_failed += 1;
            warn!(%partition, collection, %id, ?mode, error = %err, "local write failed");
        }
        result
    }

    /// Returns the current snapshot of a partition.
    ///
    /// Unknown partitions yield an empty snapshot.
    pub fn get_snapshot(&self, partition: &PartitionKey) -> Snapshot {
        self.inner
            .partitions
            .read()
            .get(partition)
            .map(|slot| slot.snapshot.clone())
            .unwrap_or_else(|| Snapshot::empty(partition.clone()))
    }

    /// Merges locally persisted data into a partition with the configured
    /// merge policy.
    ///
    /// May be called before the first fetch; the data then survives an
    /// empty remote read.
    pub fn hydrate(&self, partition: &PartitionKey, data: PartitionData) -> SyncResult<()> {
        for name in data.keys() {
            validate_collection_name(name)?;
        }
        {
            let mut partitions = self.inner.partitions.write();
            let slot = partitions
                .entry(partition.clone())
                .or_insert_with(|| PartitionSlot::new(partition.clone(), self.inner.next_generation()));
            slot.snapshot = self.inner.config.merge_policy.merge(&slot.snapshot, &data);
        }
        debug!(%partition, collections = data.len(), "hydrated partition");
        self.inner.emit(EngineEvent::SnapshotUpdated {
            partition: partition.clone(),
            collection: None,
            source: UpdateSource::Hydrate,
        });
        Ok(())
    }

    /// Drops a partition: cancels its subscriptions, resets its snapshot to
    /// empty and removes its cached copy.
    ///
    /// Returns false if the partition was unknown.
    pub fn teardown(&self, partition: &PartitionKey) -> bool {
        self.inner.teardown(partition)
    }

    /// Tears down every partition (sign-out).
    pub fn teardown_all(&self) {
        self.inner.identity_partitions.lock().clear();
        for partition in self.partitions() {
            self.inner.teardown(&partition);
        }
    }

    /// Returns the lifecycle state of a partition.
    pub fn state(&self, partition: &PartitionKey) -> PartitionState {
        self.inner
            .partitions
            .read()
            .get(partition)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    /// Returns every partition the engine holds.
    pub fn partitions(&self) -> Vec<PartitionKey> {
        self.inner.partitions.read().keys().cloned().collect()
    }

    /// Returns the engine statistics.
    pub fn stats(&self) -> EngineStats {
        self.inner.stats.read().clone()
    }

    /// Returns the last fetch, subscription or cache failure of a partition.
    ///
    /// Cleared by the next successful fetch.
    pub fn last_error(&self, partition: &PartitionKey) -> Option<ErrorReport> {
        self.inner
            .partitions
            .read()
            .get(partition)
            .and_then(|slot| slot.last_error.clone())
    }

    /// Subscribes to engine events, errors included.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Switches the engine to the partitions of an identity.
    ///
    /// Partitions of the previous identity that the new one does not use
    /// are torn down; new ones are initialized. `None` signs out.
    pub async fn apply_identity(&self, identity: Option<Identity>) -> SyncResult<Vec<RefreshOutcome>> {
        let next = match &identity {
            Some(identity) => self.inner.config.partition_selector.select(identity)?,
            None => Vec::new(),
        };
        let previous = std::mem::replace(&mut *self.inner.identity_partitions.lock(), next.clone());

        for partition in previous.iter().filter(|p| !next.contains(p)) {
            self.inner.teardown(partition);
        }
        let pending: Vec<PartitionKey> = next
            .into_iter()
            .filter(|p| !self.state(p).is_initialized())
            .collect();

        match &identity {
            Some(identity) => info!(uid = %identity.uid, partitions = pending.len(), "identity applied"),
            None => info!("signed out"),
        }
        Ok(self.initialize(pending).await)
    }

    /// Forwards auth state changes to [`apply_identity`](Self::apply_identity)
    /// on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch_auth<A: AuthProvider + ?Sized>(&self, provider: &A) -> AuthWatch {
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<Identity>>();
        let registration = provider.on_state_change(Arc::new(move |identity| {
            // the receiver is gone only once the watch is stopped
            let _ = tx.send(identity);
        }));

        let engine = self.clone();
        let task = tokio::spawn(async move {
            while let Some(identity) = rx.recv().await {
                if let Err(err) = engine.apply_identity(identity).await {
                    warn!(error = %err, "failed to apply identity");
                }
            }
        });
        AuthWatch::new(registration, task)
    }

    /// Uploads a file and stores its URL in `field` of the entity.
    ///
    /// The entity is returned for the caller to write; nothing is written
    /// here.
    pub async fn upload_attachment<B: BlobStore + ?Sized>(
        &self,
        blobs: &B,
        mut entity: Entity,
        field: &str,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> SyncResult<Entity> {
        validate_field_name(field)?;
        let size = bytes.len();
        let url = blobs.upload(name, content_type, bytes).await?;
        entity.set_field(field, url);
        self.inner.stats.write().attachments_uploaded += 1;
        debug!(id = %entity.id, field, size, "attachment uploaded");
        Ok(entity)
    }
}

impl<S: RemoteStore> EngineInner<S> {
    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst)
    }

    fn emit(&self, event: EngineEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn collection_spec(&self, partition: &PartitionKey, collection: &str) -> SyncResult<&CollectionSpec> {
        self.config
            .collection(collection)
            .ok_or_else(|| SyncError::collection_not_found(partition, collection))
    }

    fn initialized_generation(&self, partition: &PartitionKey) -> SyncResult<u64> {
        self.partitions
            .read()
            .get(partition)
            .filter(|slot| slot.state.is_initialized())
            .map(|slot| slot.generation)
            .ok_or_else(|| SyncError::partition_not_found(partition))
    }

    fn record_error(&self, partition: &PartitionKey, collection: Option<&str>, error: &SyncError) -> ErrorReport {
        let report = ErrorReport::new(partition, collection, error);
        warn!(%partition, collection = ?report.collection, error = %error, "sync error");
        if let Some(slot) = self.partitions.write().get_mut(partition) {
            slot.last_error = Some(report.clone());
        }
        self.stats.write().last_error = Some(report.to_string());
        self.emit(EngineEvent::Error(report.clone()));
        report
    }

    fn persist(&self, snapshot: &Snapshot) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.save(snapshot) {
                self.record_error(&snapshot.partition, None, &err);
            }
        }
    }

    fn outcome(&self, partition: &PartitionKey, collections: usize, error: Option<ErrorReport>) -> RefreshOutcome {
        let partitions = self.partitions.read();
        let slot = partitions.get(partition);
        RefreshOutcome {
            partition: partition.clone(),
            state: slot.map(|s| s.state).unwrap_or_default(),
            collections,
            entities: slot.map_or(0, |s| s.snapshot.entity_count()),
            error,
        }
    }

    /// Fetches a partition. The error, if any, is also in the outcome.
    async fn load(&self, partition: &PartitionKey, require_initialized: bool) -> (RefreshOutcome, Option<SyncError>) {
        let generation = match self.begin_loading(partition, require_initialized) {
            Ok(generation) => generation,
            Err(err) => {
                let report = ErrorReport::new(partition, None, &err);
                return (self.outcome(partition, 0, Some(report)), Some(err));
            }
        };

        let mut fetched = Vec::with_capacity(self.config.collections.len());
        for spec in &self.config.collections {
            match self.store.fetch_all(partition, &spec.name).await {
                Ok(documents) => fetched.push((spec, documents)),
                Err(err) => {
                    let report = self.fail_loading(partition, generation, &spec.name, &err);
                    return (self.outcome(partition, fetched.len(), Some(report)), Some(err));
                }
            }
        }

        let count = fetched.len();
        match self.finish_loading(partition, generation, fetched) {
            Ok(outcome) => (outcome, None),
            Err(err) => {
                let report = ErrorReport::new(partition, None, &err);
                (self.outcome(partition, count, Some(report)), Some(err))
            }
        }
    }

    fn begin_loading(&self, partition: &PartitionKey, require_initialized: bool) -> SyncResult<u64> {
        let (generation, from) = {
            let mut partitions = self.partitions.write();
            if require_initialized
                && !partitions
                    .get(partition)
                    .is_some_and(|slot| slot.state.is_initialized())
            {
                return Err(SyncError::partition_not_found(partition));
            }
            let slot = partitions
                .entry(partition.clone())
                .or_insert_with(|| PartitionSlot::new(partition.clone(), self.next_generation()));
            if !slot.state.can_begin_loading() {
                return Err(SyncError::InvalidStateTransition {
                    from: slot.state.name().into(),
                    to: PartitionState::Loading.name().into(),
                });
            }
            let from = slot.state;
            slot.state = PartitionState::Loading;
            (slot.generation, from)
        };

        debug!(%partition, %from, "loading partition");
        self.emit(EngineEvent::StateChanged {
            partition: partition.clone(),
            from,
            to: PartitionState::Loading,
        });
        if from == PartitionState::Uninitialized {
            self.restore_cached(partition, generation);
        }
        Ok(generation)
    }

    fn restore_cached(&self, partition: &PartitionKey, generation: u64) {
        let Some(cache) = &self.cache else {
            return;
        };
        let cached = match cache.load(partition) {
            Ok(Some(cached)) => cached,
            Ok(None) => return,
            Err(err) => {
                self.record_error(partition, None, &err);
                return;
            }
        };

        let applied = {
            let mut partitions = self.partitions.write();
            match partitions.get_mut(partition) {
                Some(slot) if slot.generation == generation => {
                    slot.snapshot = self.config.merge_policy.merge(&slot.snapshot, &cached.collections);
                    true
                }
                _ => false,
            }
        };
        if applied {
            debug!(%partition, entities = cached.entity_count(), "restored cached snapshot");
            self.emit(EngineEvent::SnapshotUpdated {
                partition: partition.clone(),
                collection: None,
                source: UpdateSource::Cache,
            });
        }
    }

    fn finish_loading(
        &self,
        partition: &PartitionKey,
        generation: u64,
        fetched: Vec<(&CollectionSpec, Vec<RemoteDocument>)>,
    ) -> SyncResult<RefreshOutcome> {
        let now = self.clock.now();
        let collections = fetched.len();
        let (entities, snapshot) = {
            let mut partitions = self.partitions.write();
            let slot = match partitions.get_mut(partition) {
                Some(slot) if slot.generation == generation => slot,
                _ => return Err(SyncError::partition_not_found(partition)),
            };

            let mut incoming = PartitionData::new();
            for (spec, documents) in fetched {
                let value = slot.adapter(spec).materialize(documents, now);
                incoming.insert(spec.name.clone(), value);
            }
            slot.snapshot = self.config.merge_policy.merge(&slot.snapshot, &incoming);
            slot.state = PartitionState::Ready;
            slot.last_error = None;
            (slot.snapshot.entity_count(), slot.snapshot.clone())
        };

        {
            let mut stats = self.stats.write();
            stats.fetches_completed += 1;
            stats.last_refresh = Some(now);
        }
        info!(%partition, collections, entities, "partition ready");
        self.emit(EngineEvent::StateChanged {
            partition: partition.clone(),
            from: PartitionState::Loading,
            to: PartitionState::Ready,
        });
        self.emit(EngineEvent::SnapshotUpdated {
            partition: partition.clone(),
            collection: None,
            source: UpdateSource::Fetch,
        });
        self.persist(&snapshot);

        Ok(RefreshOutcome {
            partition: partition.clone(),
            state: PartitionState::Ready,
            collections,
            entities,
            error: None,
        })
    }

    /// Ends a failed fetch: the snapshot is kept and the partition is Ready.
    fn fail_loading(
        &self,
        partition: &PartitionKey,
        generation: u64,
        collection: &str,
        error: &SyncError,
    ) -> ErrorReport {
        let moved = {
            let mut partitions = self.partitions.write();
            match partitions.get_mut(partition) {
                Some(slot) if slot.generation == generation && slot.state == PartitionState::Loading => {
                    slot.state = PartitionState::Ready;
                    true
                }
                _ => false,
            }
        };
        self.stats.write().fetches_failed += 1;
        if moved {
            self.emit(EngineEvent::StateChanged {
                partition: partition.clone(),
                from: PartitionState::Loading,
                to: PartitionState::Ready,
            });
        }
        self.record_error(partition, Some(collection), error)
    }

    /// Applies a subscription delivery as a full replacement of the
    /// collection. Returns the new value, or `None` if the partition was
    /// torn down.
    fn apply_push(
        &self,
        partition: &PartitionKey,
        spec: &CollectionSpec,
        generation: u64,
        documents: Vec<RemoteDocument>,
    ) -> Option<Collection> {
        let now = self.clock.now();
        let (value, snapshot) = {
            let mut partitions = self.partitions.write();
            let slot = match partitions.get_mut(partition) {
                Some(slot) if slot.generation == generation => slot,
                _ => return None,
            };
            slot.prune_subscriptions();
            let value = slot.adapter(spec).materialize(documents, now);
            slot.snapshot = MergePolicy::replace_collection(&slot.snapshot, &spec.name, value.clone());
            (value, slot.snapshot.clone())
        };

        self.stats.write().pushes_applied += 1;
        debug!(%partition, collection = %spec.name, len = value.len(), "applied delivery");
        self.emit(EngineEvent::SnapshotUpdated {
            partition: partition.clone(),
            collection: Some(spec.name.clone()),
            source: UpdateSource::Push,
        });
        self.persist(&snapshot);
        Some(value)
    }

    async fn write_through(
        &self,
        partition: &PartitionKey,
        collection: &str,
        entity: Entity,
        mode: WriteMode,
    ) -> SyncResult<()> {
        let spec = self.collection_spec(partition, collection)?;
        validate_write(spec, &entity, mode)?;
        let generation = self.initialized_generation(partition)?;

        match mode {
            WriteMode::Upsert => self.store.put(partition, collection, &entity).await?,
            WriteMode::Delete => self.store.delete(partition, collection, &entity.id).await?,
        }

        let snapshot = {
            let mut partitions = self.partitions.write();
            let Some(slot) = partitions
                .get_mut(partition)
                .filter(|slot| slot.generation == generation)
            else {
                debug!(%partition, collection, "partition torn down during write");
                return Ok(());
            };
            slot.prune_subscriptions();
            slot.snapshot = match mode {
                WriteMode::Upsert => MergePolicy::upsert_into(&slot.snapshot, collection, spec.kind, entity)?,
                WriteMode::Delete => MergePolicy::remove(&slot.snapshot, collection, &entity.id)?,
            };
            slot.snapshot.clone()
        };

        self.stats.write().writes_confirmed += 1;
        debug!(%partition, collection, ?mode, "local write confirmed");
        self.emit(EngineEvent::SnapshotUpdated {
            partition: partition.clone(),
            collection: Some(collection.to_string()),
            source: UpdateSource::LocalWrite,
        });
        self.persist(&snapshot);
        Ok(())
    }

    fn teardown(&self, partition: &PartitionKey) -> bool {
        let Some(slot) = self.partitions.write().remove(partition) else {
            return false;
        };
        for subscription in slot.subscriptions.iter().filter_map(Weak::upgrade) {
            subscription.cancel();
        }
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.remove(partition) {
                warn!(%partition, error = %err, "failed to remove cached snapshot");
            }
        }

        info!(%partition, "partition torn down");
        if slot.state != PartitionState::Uninitialized {
            self.emit(EngineEvent::StateChanged {
                partition: partition.clone(),
                from: slot.state,
                to: PartitionState::Uninitialized,
            });
        }
        true
    }
}

fn validate_field_name(name: &str) -> SyncResult<()> {
    if name.is_empty() {
        return Err(SyncError::validation("field names must not be empty"));
    }
    if name.starts_with("__") {
        return Err(SyncError::validation(format!("field name {name} is reserved")));
    }
    Ok(())
}

fn validate_write(spec: &CollectionSpec, entity: &Entity, mode: WriteMode) -> SyncResult<()> {
    match mode {
        WriteMode::Delete if spec.kind == CollectionKind::Settings => Err(SyncError::validation(format!(
            "cannot delete {} from settings collection {}",
            entity.id, spec.name
        ))),
        WriteMode::Delete => Ok(()),
        WriteMode::Upsert => entity.fields.keys().try_for_each(|key| validate_field_name(key)),
    }
}
