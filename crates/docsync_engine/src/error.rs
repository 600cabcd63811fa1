//! Error types for the sync engine.

use docsync_core::{CoreError, PartitionKey};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or availability failure. The snapshot is left unmodified.
    #[error("transient error: {message}")]
    Transient {
        /// Error message.
        message: String,
    },

    /// The store refused access. Never retried automatically.
    #[error("permission denied for {partition}/{collection}: {message}")]
    Permission {
        /// Partition the request targeted.
        partition: PartitionKey,
        /// Collection the request targeted.
        collection: String,
        /// Error message.
        message: String,
    },

    /// Unknown partition or collection.
    #[error("not found: {partition}{}", .collection.as_deref().map(|c| format!("/{c}")).unwrap_or_default())]
    NotFound {
        /// Partition the request targeted.
        partition: PartitionKey,
        /// Collection the request targeted, if any.
        collection: Option<String>,
    },

    /// Malformed input, rejected before any network call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Model-level error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Snapshot cache failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// I/O error from the snapshot cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`SyncError`], carried on engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retryable availability issue.
    Transient,
    /// Access refused.
    Permission,
    /// Unknown partition or collection.
    NotFound,
    /// Malformed input or model violation.
    Validation,
    /// Engine state machine misuse.
    State,
    /// Local cache failure.
    Cache,
}

impl SyncError {
    /// Creates a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a permission error.
    pub fn permission(
        partition: &PartitionKey,
        collection: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::Permission {
            partition: partition.clone(),
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    /// Creates a not-found error for a partition.
    pub fn partition_not_found(partition: &PartitionKey) -> Self {
        Self::NotFound {
            partition: partition.clone(),
            collection: None,
        }
    }

    /// Creates a not-found error for a collection.
    pub fn collection_not_found(partition: &PartitionKey, collection: &str) -> Self {
        Self::NotFound {
            partition: partition.clone(),
            collection: Some(collection.to_string()),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient { .. })
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transient { .. } => ErrorKind::Transient,
            SyncError::Permission { .. } => ErrorKind::Permission,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::Validation(_) | SyncError::Core(_) => ErrorKind::Validation,
            SyncError::InvalidStateTransition { .. } => ErrorKind::State,
            SyncError::Cache(_) | SyncError::Io(_) | SyncError::Serialization(_) => {
                ErrorKind::Cache
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en() -> PartitionKey {
        PartitionKey::new("en").unwrap()
    }

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transient("connection lost").is_retryable());
        assert!(!SyncError::permission(&en(), "clips", "denied").is_retryable());
        assert!(!SyncError::partition_not_found(&en()).is_retryable());
        assert!(!SyncError::validation("empty field name").is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::collection_not_found(&en(), "courses").to_string(),
            "not found: en/courses"
        );
        assert_eq!(
            SyncError::partition_not_found(&en()).to_string(),
            "not found: en"
        );

        let err = SyncError::permission(&en(), "clips", "missing or insufficient permissions");
        assert!(err.to_string().contains("en/clips"));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(SyncError::transient("x").kind(), ErrorKind::Transient);
        assert_eq!(SyncError::Cache("x".into()).kind(), ErrorKind::Cache);
        let core = CoreError::InvalidCollectionName { name: String::new() };
        assert_eq!(SyncError::from(core).kind(), ErrorKind::Validation);
    }
}
