//! Blob storage for media attached to entities.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Uploads files and returns a URL the entity stores as an opaque string.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads a file.
    async fn upload(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> SyncResult<String>;
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Original file name.
    pub name: String,
    /// MIME type.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// In-memory blob storage with `memory://` URLs.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
    max_bytes: Option<usize>,
}

impl MemoryBlobStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects uploads larger than `max_bytes`.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Looks up a blob by URL.
    pub fn get(&self, url: &str) -> Option<StoredBlob> {
        self.blobs.read().get(url).cloned()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if nothing was uploaded.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> SyncResult<String> {
        if name.is_empty() || name.contains('/') {
            return Err(SyncError::validation(format!("invalid file name: {name:?}")));
        }
        if let Some(max) = self.max_bytes {
            if bytes.len() > max {
                return Err(SyncError::validation(format!(
                    "file {name} is {} bytes, limit is {max}",
                    bytes.len()
                )));
            }
        }

        let url = format!("memory://blobs/{}/{name}", Uuid::new_v4());
        self.blobs.write().insert(
            url.clone(),
            StoredBlob {
                name: name.to_string(),
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(url)
    }
}
