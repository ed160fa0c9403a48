// # File Object Store
//
// File-backed implementation of ObjectStore with crash recovery.
//
// ## Purpose
//
// Keeps a JSON snapshot of every object on disk so the daemon can be
// pointed at a fleet description, reconcile it, and leave the resulting
// EndpointSlices behind for the next run.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good snapshot
// - Recovery: Falls back to backup only for a truncated file (an interrupted
//   write). Any other parse failure is reported and the file left untouched,
//   since it is usually a hand edit.
//
// `version` and `savedAt` may be omitted in hand-written snapshots.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "savedAt": "2025-01-09T12:00:00Z",
//   "objects": [
//     { "kind": "Cluster", "metadata": { "name": "c1", "namespace": "ns1" } }
//   ]
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::config::StoreConfig;
use crate::model::{Kind, Object, ObjectKey};
use crate::store::ObjectTable;
use crate::traits::{ObjectQuery, ObjectStore, ObjectStoreFactory, Query, QueryResult};

/// Snapshot file format version
const SNAPSHOT_VERSION: &str = "1.0";

/// File-backed object store with crash recovery
///
/// Every write is flushed to disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use mcdomain_core::model::Cluster;
/// use mcdomain_core::store::FileObjectStore;
/// use mcdomain_core::traits::ObjectStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileObjectStore::new("/var/lib/mcdomain/objects.json").await?;
///     store.persist(Cluster::new("ns1", "c1").into()).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileObjectStore {
    path: PathBuf,
    state: RwLock<FileState>,
    /// Serializes snapshot writes so temp files never interleave
    write_lock: Mutex<()>,
}

/// Internal state for file-backed store
#[derive(Debug)]
struct FileState {
    table: ObjectTable,
    dirty: bool,
}

/// Serializable snapshot format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFormat {
    #[serde(default = "default_snapshot_version")]
    version: String,
    #[serde(default = "chrono::Utc::now")]
    saved_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    objects: Vec<Object>,
}

fn default_snapshot_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

impl FileObjectStore {
    /// Create or load a file object store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing snapshot
    /// 3. If it is truncated, try to load from backup
    /// 4. If the backup fails too, start empty
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the snapshot is complete but not a valid
    /// snapshot (syntax error, unknown kind). The file is not modified.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let objects = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(FileState {
                table: ObjectTable::from_objects(objects),
                dirty: false,
            }),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load snapshot with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main snapshot
    /// 2. If it ends early, try loading backup
    /// 3. If backup also fails, start empty
    async fn load_with_recovery(path: &Path) -> Result<Vec<Object>, Error> {
        match Self::load(path).await {
            Ok(objects) => {
                tracing::debug!("Loaded snapshot: {} objects", objects.len());
                Ok(objects)
            }
            Err(Error::Json(e)) if !Self::is_truncated(&e) => Err(Error::config(format!(
                "Snapshot {} is not a valid object snapshot: {}",
                path.display(),
                e
            ))),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Snapshot {} is truncated: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(Vec::new());
                }

                match Self::load(&backup_path).await {
                    Ok(objects) => {
                        tracing::info!("Recovered snapshot from backup: {} objects", objects.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore snapshot from backup: {}",
                                restore_err
                            );
                        }
                        Ok(objects)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(Vec::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a parse failure means the file ended early
    ///
    /// Snapshots are written whole through a temp file, so only an
    /// interrupted write (or a crash mid-copy) leaves one cut short.
    fn is_truncated(error: &serde_json::Error) -> bool {
        error.classify() == serde_json::error::Category::Eof
    }

    /// Load objects from a snapshot file
    async fn load(path: &Path) -> Result<Vec<Object>, Error> {
        if !path.exists() {
            tracing::debug!("Snapshot does not exist: {}", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;

        let snapshot: SnapshotFormat = serde_json::from_str(&content)?;

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                "Snapshot version mismatch: expected {}, got {}. Attempting to load anyway.",
                SNAPSHOT_VERSION,
                snapshot.version
            );
        }

        Ok(snapshot.objects)
    }

    /// Write the snapshot atomically
    async fn write_snapshot(&self) -> Result<(), Error> {
        let _write_guard = self.write_lock.lock().await;

        let json = {
            let state = self.read()?;
            let snapshot = SnapshotFormat {
                version: SNAPSHOT_VERSION.to_string(),
                saved_at: chrono::Utc::now(),
                objects: state.table.objects().cloned().collect(),
            };
            serde_json::to_string_pretty(&snapshot)
                .map_err(|e| Error::store(format!("Failed to serialize snapshot: {}", e)))?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.write()?.dirty = false;

        tracing::trace!("Snapshot written: {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FileState>, Error> {
        self.state
            .read()
            .map_err(|_| Error::store("file store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FileState>, Error> {
        self.state
            .write()
            .map_err(|_| Error::store("file store lock poisoned"))
    }
}

impl ObjectQuery for FileObjectStore {
    fn query(&self, query: &Query) -> Result<QueryResult, Error> {
        Ok(self.read()?.table.query(query))
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn persist(&self, object: Object) -> Result<Object, Error> {
        let stored = {
            let mut state = self.write()?;
            state.dirty = true;
            state.table.insert(object)
        };

        // Immediate write for durability
        self.write_snapshot().await?;
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<Vec<ObjectKey>, Error> {
        let removed = {
            let mut state = self.write()?;
            let removed = state.table.remove_cascade(key);
            state.dirty |= !removed.is_empty();
            removed
        };

        if !removed.is_empty() {
            self.write_snapshot().await?;
        }
        Ok(removed)
    }

    async fn list(&self, kind: Kind) -> Result<Vec<Object>, Error> {
        Ok(self.read()?.table.list(kind))
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.read()?.dirty;
        if dirty {
            self.write_snapshot().await
        } else {
            Ok(())
        }
    }
}

/// Factory for [`FileObjectStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FileObjectStoreFactory;

#[async_trait]
impl ObjectStoreFactory for FileObjectStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Arc::new(FileObjectStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
