//! Error types for the DocSync data model.

use thiserror::Error;

/// Result type for model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while building or validating model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Partition key is empty or malformed.
    #[error("invalid partition key {key:?}: {reason}")]
    InvalidPartitionKey {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Entity id is empty or malformed.
    #[error("invalid entity id {id:?}: {reason}")]
    InvalidEntityId {
        /// The offending id.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Collection name is empty or malformed.
    #[error("invalid collection name {name:?}")]
    InvalidCollectionName {
        /// The offending name.
        name: String,
    },

    /// An operation expected a different collection kind.
    #[error("collection {collection} is a {actual} collection, expected {expected}")]
    KindMismatch {
        /// Collection name.
        collection: String,
        /// Kind the operation needs.
        expected: &'static str,
        /// Kind actually stored.
        actual: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::InvalidEntityId {
            id: "a/b".into(),
            reason: "contains '/'",
        };
        assert_eq!(err.to_string(), "invalid entity id \"a/b\": contains '/'");

        let err = CoreError::KindMismatch {
            collection: "theme".into(),
            expected: "list",
            actual: "settings",
        };
        assert!(err.to_string().contains("theme"));
        assert!(err.to_string().contains("expected list"));
    }
}
