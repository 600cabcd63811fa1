//! # DocSync Core
//!
//! Snapshot data model and merge policy for DocSync.
//!
//! This crate provides:
//! - Validated identifiers (`PartitionKey`, `EntityId`) and `Timestamp`
//! - `Entity`, `Collection` (entity list or settings object) and `Snapshot`
//! - `MergePolicy`, the single rule set for reconciling remote reads with
//!   local state
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - A populated collection never regresses to empty on an empty remote read
//! - Entity ids are unique within a list; upserts replace in place
//! - Merging is deterministic and idempotent

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod entity;
mod error;
mod ids;
mod merge;
mod snapshot;

pub use collection::{dedupe_by_id, is_blank, Collection, CollectionKind};
pub use entity::Entity;
pub use error::{CoreError, CoreResult};
pub use ids::{validate_collection_name, EntityId, PartitionKey, Timestamp, MAX_ENTITY_ID_LEN};
pub use merge::MergePolicy;
pub use snapshot::{PartitionData, Snapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
