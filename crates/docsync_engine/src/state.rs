//! Partition state machine, statistics and engine events.

use crate::error::{ErrorKind, SyncError};
use docsync_core::{PartitionKey, Timestamp};
use serde::Serialize;
use std::fmt;

/// Lifecycle state of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionState {
    /// Never fetched, or torn down.
    #[default]
    Uninitialized,
    /// A fetch is in flight.
    Loading,
    /// The last fetch finished, with or without data.
    Ready,
}

impl PartitionState {
    /// Returns the state name.
    pub const fn name(self) -> &'static str {
        match self {
            PartitionState::Uninitialized => "uninitialized",
            PartitionState::Loading => "loading",
            PartitionState::Ready => "ready",
        }
    }

    /// Returns true if a fetch may start from this state.
    pub fn can_begin_loading(&self) -> bool {
        matches!(self, PartitionState::Uninitialized | PartitionState::Ready)
    }

    /// Returns true once the partition accepts writes and subscriptions.
    pub fn is_initialized(&self) -> bool {
        !matches!(self, PartitionState::Uninitialized)
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What changed a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// An initialize or refresh fetch.
    Fetch,
    /// A subscription delivery.
    Push,
    /// A confirmed local write.
    LocalWrite,
    /// Locally persisted data merged in by the caller.
    Hydrate,
    /// The snapshot cache.
    Cache,
}

/// A failure reported on the engine error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Partition the failure belongs to.
    pub partition: PartitionKey,
    /// Collection involved, when known.
    pub collection: Option<String>,
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl ErrorReport {
    /// Builds a report from an error.
    pub fn new(partition: &PartitionKey, collection: Option<&str>, error: &SyncError) -> Self {
        let collection = collection.map(str::to_string).or_else(|| match error {
            SyncError::Permission { collection, .. } => Some(collection.clone()),
            SyncError::NotFound { collection, .. } => collection.clone(),
            _ => None,
        });
        Self {
            partition: partition.clone(),
            collection,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collection {
            Some(collection) => write!(f, "{}/{}: {}", self.partition, collection, self.message),
            None => write!(f, "{}: {}", self.partition, self.message),
        }
    }
}

/// Notifications published on the engine event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A partition changed lifecycle state.
    StateChanged {
        /// Partition.
        partition: PartitionKey,
        /// Previous state.
        from: PartitionState,
        /// New state.
        to: PartitionState,
    },
    /// A partition snapshot changed.
    SnapshotUpdated {
        /// Partition.
        partition: PartitionKey,
        /// Collection, when a single one changed.
        collection: Option<String>,
        /// What caused the change.
        source: UpdateSource,
    },
    /// A fetch, subscription or cache operation failed.
    Error(ErrorReport),
}

/// Result of fetching one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Partition.
    pub partition: PartitionKey,
    /// State after the fetch.
    pub state: PartitionState,
    /// Number of collections fetched. On failure, those fetched before the
    /// error; none of them are applied.
    pub collections: usize,
    /// Entities in the snapshot after the fetch.
    pub entities: usize,
    /// Failure, if the fetch did not complete.
    pub error: Option<ErrorReport>,
}

impl RefreshOutcome {
    /// Returns true if the fetch completed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistics about engine operations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Fetches that completed.
    pub fetches_completed: u64,
    /// Fetches that failed.
    pub fetches_failed: u64,
    /// Subscription deliveries applied.
    pub pushes_applied: u64,
    /// Local writes confirmed by the store.
    pub writes_confirmed: u64,
    /// Local writes rejected or failed.
    pub writes_failed: u64,
    /// Subscriptions opened.
    pub subscriptions_opened: u64,
    /// Attachments uploaded.
    pub attachments_uploaded: u64,
    /// Time of the last completed fetch.
    pub last_refresh: Option<Timestamp>,
    /// Last error message.
    pub last_error: Option<String>,
}
