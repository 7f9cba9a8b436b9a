use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// RecordSet
///
/// The independently persisted collections. Each is round-tripped as one JSON
/// document and always rewritten wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSet {
    Users,
    Admins,
    Blogs,
    Comments,
    Sequences,
}

impl RecordSet {
    pub const ALL: [RecordSet; 5] = [
        RecordSet::Users,
        RecordSet::Admins,
        RecordSet::Blogs,
        RecordSet::Comments,
        RecordSet::Sequences,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            RecordSet::Users => "users.json",
            RecordSet::Admins => "admins.json",
            RecordSet::Blogs => "blogs.json",
            RecordSet::Comments => "comments.json",
            RecordSet::Sequences => "sequences.json",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error on {}: {source}", .set.file_name())]
    Io {
        set: RecordSet,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", .set.file_name())]
    Corrupt {
        set: RecordSet,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the durable side of the store. The repository owns all
/// (de)serialization; this layer only moves whole documents. Swapping
/// `JsonFileStorage` for `MockStorageService` keeps tests off the filesystem.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Returns the stored document, or `None` if the set was never written.
    async fn read_set(&self, set: RecordSet) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the stored document for `set`.
    async fn write_set(&self, set: RecordSet, bytes: Vec<u8>) -> Result<(), StorageError>;
}

// 2. The Real Implementation (JSON files on disk)
/// JsonFileStorage
///
/// One file per record set under `dir`. Writes go to a sibling temp file first and are
/// renamed into place, so a crash mid-write never leaves a truncated document.
#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, set: RecordSet) -> PathBuf {
        self.dir.join(set.file_name())
    }
}

#[async_trait]
impl StorageService for JsonFileStorage {
    async fn read_set(&self, set: RecordSet) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_for(set)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { set, source }),
        }
    }

    async fn write_set(&self, set: RecordSet, bytes: Vec<u8>) -> Result<(), StorageError> {
        let io = |source: std::io::Error| StorageError::Io { set, source };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io)?;

        let target = self.path_for(set);
        let tmp = target.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io)?;
        tokio::fs::rename(&tmp, &target).await.map_err(io)?;
        tracing::debug!(file = %target.display(), bytes = bytes.len(), "record set written");
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Keeps documents in memory. Clones share the same documents, so a test can hand one
/// clone to the repository and inspect what was persisted through another.
#[derive(Clone, Default)]
pub struct MockStorageService {
    documents: Arc<Mutex<HashMap<RecordSet, Vec<u8>>>>,
    /// When true, every write fails. Reads still succeed.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Returns a handle over the same documents whose writes fail.
    pub fn failing_view(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            should_fail: true,
        }
    }

    /// Seeds a document as if it had been written by an earlier process.
    pub async fn seed(&self, set: RecordSet, bytes: impl Into<Vec<u8>>) {
        self.documents.lock().await.insert(set, bytes.into());
    }

    pub async fn document(&self, set: RecordSet) -> Option<Vec<u8>> {
        self.documents.lock().await.get(&set).cloned()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn read_set(&self, set: RecordSet) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.documents.lock().await.get(&set).cloned())
    }

    async fn write_set(&self, set: RecordSet, bytes: Vec<u8>) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable(format!(
                "mock refused write of {}",
                set.file_name()
            )));
        }
        self.documents.lock().await.insert(set, bytes);
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage collaborator.
pub type StorageState = Arc<dyn StorageService>;
