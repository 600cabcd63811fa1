//! Subscription handles.

use crate::store::RemoteSubscription;
use docsync_core::PartitionKey;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Shared state of one subscription.
///
/// Owned by the store-side handler and by the [`Subscription`] handle; the
/// engine only keeps a weak reference for teardown.
pub(crate) struct SubscriptionInner {
    pub(crate) partition: PartitionKey,
    pub(crate) collection: String,
    active: AtomicBool,
    remote: Mutex<Option<Box<dyn RemoteSubscription>>>,
}

impl SubscriptionInner {
    pub(crate) fn new(partition: PartitionKey, collection: String) -> Self {
        Self {
            partition,
            collection,
            active: AtomicBool::new(true),
            remote: Mutex::new(None),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stores the store registration. Cancels it at once if the
    /// subscription was already cancelled.
    pub(crate) fn attach(&self, remote: Box<dyn RemoteSubscription>) {
        if !self.is_active() {
            remote.cancel();
            return;
        }
        *self.remote.lock() = Some(remote);
        // cancel() may have run between the check and the store above
        if !self.is_active() {
            if let Some(remote) = self.remote.lock().take() {
                remote.cancel();
            }
        }
    }

    /// Stops delivery. Returns false if it was already stopped.
    pub(crate) fn cancel(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        let remote = self.remote.lock().take();
        if let Some(remote) = remote {
            remote.cancel();
        }
        debug!(partition = %self.partition, collection = %self.collection, "subscription cancelled");
        true
    }
}

/// Handle to a live subscription.
///
/// Dropping the handle unsubscribes. Use [`detach`](Self::detach) to keep
/// the subscription running for the life of the partition.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    inner: Option<Arc<SubscriptionInner>>,
}

impl Subscription {
    pub(crate) fn new(inner: Arc<SubscriptionInner>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Stops all further callbacks. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if let Some(inner) = &self.inner {
            inner.cancel();
        }
    }

    /// Returns true until unsubscribed or torn down.
    pub fn is_active(&self) -> bool {
        self.inner.as_ref().is_some_and(|i| i.is_active())
    }

    /// Partition the subscription belongs to.
    pub fn partition(&self) -> Option<&PartitionKey> {
        self.inner.as_ref().map(|i| &i.partition)
    }

    /// Collection the subscription listens to.
    pub fn collection(&self) -> Option<&str> {
        self.inner.as_ref().map(|i| i.collection.as_str())
    }

    /// Releases the handle without unsubscribing.
    ///
    /// The subscription then ends only when its partition is torn down.
    pub fn detach(mut self) {
        self.inner = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("partition", &self.partition())
            .field("collection", &self.collection())
            .field("active", &self.is_active())
            .finish()
    }
}
