//! Local snapshot persistence.
//!
//! The cache lets a partition show its last known data before the first
//! fetch completes. Cached data is merged with the same policy as a fetch,
//! so it can never blank out fresher state.

use crate::error::{SyncError, SyncResult};
use docsync_core::{PartitionKey, Snapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stores one snapshot per partition.
pub trait SnapshotCache: Send + Sync {
    /// Loads the cached snapshot of a partition.
    fn load(&self, partition: &PartitionKey) -> SyncResult<Option<Snapshot>>;

    /// Saves a snapshot, replacing any previous one.
    fn save(&self, snapshot: &Snapshot) -> SyncResult<()>;

    /// Removes the cached snapshot of a partition.
    fn remove(&self, partition: &PartitionKey) -> SyncResult<()>;
}

/// A process-local cache.
#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    snapshots: RwLock<HashMap<PartitionKey, Snapshot>>,
}

impl MemorySnapshotCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for MemorySnapshotCache {
    fn load(&self, partition: &PartitionKey) -> SyncResult<Option<Snapshot>> {
        Ok(self.snapshots.read().get(partition).cloned())
    }

    fn save(&self, snapshot: &Snapshot) -> SyncResult<()> {
        self.snapshots
            .write()
            .insert(snapshot.partition.clone(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, partition: &PartitionKey) -> SyncResult<()> {
        self.snapshots.write().remove(partition);
        Ok(())
    }
}

/// A cache of JSON files, one per partition.
///
/// Files are replaced atomically: written to a temp file, synced, then
/// renamed over the old one.
#[derive(Debug, Clone)]
pub struct FileSnapshotCache {
    dir: PathBuf,
}

impl FileSnapshotCache {
    /// Opens a cache directory, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> SyncResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, partition: &PartitionKey) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(partition)))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> SyncResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> SyncResult<()> {
        Ok(())
    }
}

impl SnapshotCache for FileSnapshotCache {
    fn load(&self, partition: &PartitionKey) -> SyncResult<Option<Snapshot>> {
        let path = self.path_for(partition);
        if !path.exists() {
            return Ok(None);
        }
        let snapshot: Snapshot = serde_json::from_slice(&fs::read(&path)?)?;
        if &snapshot.partition != partition {
            return Err(SyncError::Cache(format!(
                "{} holds partition {}, expected {}",
                path.display(),
                snapshot.partition,
                partition
            )));
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let path = self.path_for(&snapshot.partition);
        let temp_path = path.with_extension("json.tmp");

        let mut file = File::create(&temp_path)?;
        serde_json::to_writer(&mut file, snapshot)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        self.sync_directory()
    }

    fn remove(&self, partition: &PartitionKey) -> SyncResult<()> {
        match fs::remove_file(self.path_for(partition)) {
            Ok(()) => self.sync_directory(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// File name for a partition. Keys outside `[A-Za-z0-9_-]` are hex-encoded
/// behind a `~` so distinct keys never share a file.
fn file_stem(partition: &PartitionKey) -> String {
    let key = partition.as_str();
    if key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return key.to_string();
    }
    let mut stem = String::with_capacity(1 + key.len() * 2);
    stem.push('~');
    for byte in key.bytes() {
        stem.push_str(&format!("{byte:02x}"));
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::{Collection, Entity, EntityId, PartitionData};
    use tempfile::tempdir;

    fn key(value: &str) -> PartitionKey {
        PartitionKey::new(value).unwrap()
    }

    fn snapshot(partition: &str) -> Snapshot {
        let mut data = PartitionData::new();
        data.insert(
            "courses".into(),
            Collection::List(vec![
                Entity::new(EntityId::new("c1").unwrap()).with_field("title", "Logic")
            ]),
        );
        Snapshot::with_collections(key(partition), data)
    }

    #[test]
    fn file_cache_roundtrip() {
        let dir = tempdir().unwrap();
        let cache = FileSnapshotCache::open(dir.path().join("snapshots")).unwrap();

        assert!(cache.load(&key("en")).unwrap().is_none());
        cache.save(&snapshot("en")).unwrap();
        assert_eq!(cache.load(&key("en")).unwrap(), Some(snapshot("en")));
        assert!(!dir.path().join("snapshots/en.json.tmp").exists());

        cache.remove(&key("en")).unwrap();
        cache.remove(&key("en")).unwrap();
        assert!(cache.load(&key("en")).unwrap().is_none());
    }

    #[test]
    fn file_cache_survives_reopen() {
        let dir = tempdir().unwrap();
        FileSnapshotCache::open(dir.path())
            .unwrap()
            .save(&snapshot("uid-42"))
            .unwrap();

        let reopened = FileSnapshotCache::open(dir.path()).unwrap();
        assert_eq!(reopened.load(&key("uid-42")).unwrap(), Some(snapshot("uid-42")));
    }

    #[test]
    fn unusual_keys_get_distinct_files() {
        assert_eq!(file_stem(&key("en")), "en");
        assert_eq!(file_stem(&key("a.b")), "~612e62");
        assert_ne!(file_stem(&key("a b")), file_stem(&key("a_b")));

        let dir = tempdir().unwrap();
        let cache = FileSnapshotCache::open(dir.path()).unwrap();
        cache.save(&snapshot("user@example.com")).unwrap();
        assert!(cache.load(&key("user@example.com")).unwrap().is_some());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let cache = FileSnapshotCache::open(dir.path()).unwrap();
        fs::write(dir.path().join("en.json"), b"not json").unwrap();
        assert!(matches!(
            cache.load(&key("en")),
            Err(SyncError::Serialization(_))
        ));
    }

    #[test]
    fn memory_cache() {
        let cache = MemorySnapshotCache::new();
        cache.save(&snapshot("en")).unwrap();
        assert!(cache.load(&key("en")).unwrap().is_some());
        cache.remove(&key("en")).unwrap();
        assert!(cache.load(&key("en")).unwrap().is_none());
    }
}
