//! # DocSync Engine
//!
//! Keeps local snapshots of a partitioned document store up to date.
//!
//! This crate provides:
//! - `SyncEngine`: one snapshot per partition, fetches, push
//!   subscriptions and write-through mutations
//! - `SubscriptionAdapter`: ordered, fully materialized collections from
//!   store deliveries, with placeholder ordering for pending timestamps
//! - Capability traits for the remote store, auth provider and blob
//!   storage, with in-memory implementations
//! - Snapshot caches (memory and atomic JSON files)
//!
//! ## Architecture
//!
//! The store is the source of truth:
//! 1. Fetches are folded into the snapshot with a `MergePolicy`, so an empty
//!    read never blanks out populated data
//! 2. Subscription deliveries replace the subscribed collection
//! 3. Local writes go to the store first and touch the snapshot only once
//!    confirmed
//!
//! Failures never leave a snapshot half-updated. They are returned to the
//! caller that started the operation or published on the event channel.
//!
//! ## Key Invariants
//!
//! - `get_snapshot` never blocks on I/O and never fails
//! - A cancelled subscription never calls its callback again
//! - Work started before a teardown never touches the partition after it

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod auth;
mod blob;
mod cache;
mod clock;
mod config;
mod engine;
mod error;
mod memory;
mod state;
mod store;
mod subscription;

pub use adapter::SubscriptionAdapter;
pub use auth::{AuthHandler, AuthProvider, AuthWatch, Identity, MemoryAuthProvider};
pub use blob::{BlobStore, MemoryBlobStore, StoredBlob};
pub use cache::{FileSnapshotCache, MemorySnapshotCache, SnapshotCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CollectionOrder, CollectionSpec, EngineConfig, PartitionSelector, DEFAULT_EVENT_CAPACITY};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use memory::{MemoryRemoteStore, StoreOp};
pub use state::{EngineEvent, EngineStats, ErrorReport, PartitionState, RefreshOutcome, UpdateSource};
pub use store::{ChangeHandler, RemoteDocument, RemoteEvent, RemoteStore, RemoteSubscription, WriteMode};
pub use subscription::Subscription;
