//! # DocSync Testkit
//!
//! Test utilities for DocSync.
//!
//! This crate provides:
//! - Fixtures for courses, clips, tags and theme settings
//! - A `SnapshotBuilder` for terse snapshot literals
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docsync_testkit::prelude::*;
//!
//! let snapshot = SnapshotBuilder::new()
//!     .list("courses", vec![course("c1", "Logic")])
//!     .build("en");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
