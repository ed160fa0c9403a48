// # Memory Object Store
//
// In-memory implementation of ObjectStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for embedding the engine next to another source
// of truth that replays objects on startup.
//
// ## Locking
//
// Reads are synchronous (the reconciler's query capability is), so the
// table sits behind a `std::sync::RwLock` that is never held across an
// await point.

use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Error;
use crate::config::StoreConfig;
use crate::model::{Kind, Object, ObjectKey};
use crate::store::ObjectTable;
use crate::traits::{ObjectQuery, ObjectStore, ObjectStoreFactory, Query, QueryResult};

/// In-memory object store implementation
///
/// # Example
///
/// ```rust,no_run
/// use mcdomain_core::model::Cluster;
/// use mcdomain_core::store::MemoryObjectStore;
/// use mcdomain_core::traits::ObjectStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryObjectStore::new();
///
///     store.persist(Cluster::new("ns1", "c1").into()).await?;
///     assert_eq!(store.len()?, 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<ObjectTable>>,
}

impl MemoryObjectStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with objects
    pub fn with_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ObjectTable::from_objects(objects))),
        }
    }

    /// Get the number of objects in the store
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.read()?.len())
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.read()?.len() == 0)
    }

    /// Snapshot of every object, ordered by key
    pub fn objects(&self) -> Result<Vec<Object>, Error> {
        Ok(self.read()?.objects().cloned().collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ObjectTable>, Error> {
        self.inner
            .read()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ObjectTable>, Error> {
        self.inner
            .write()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }
}

impl ObjectQuery for MemoryObjectStore {
    fn query(&self, query: &Query) -> Result<QueryResult, Error> {
        Ok(self.read()?.query(query))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn persist(&self, object: Object) -> Result<Object, Error> {
        Ok(self.write()?.insert(object))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<Vec<ObjectKey>, Error> {
        Ok(self.write()?.remove_cascade(key))
    }

    async fn list(&self, kind: Kind) -> Result<Vec<Object>, Error> {
        Ok(self.read()?.list(kind))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory for [`MemoryObjectStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryObjectStoreFactory;

#[async_trait]
impl ObjectStoreFactory for MemoryObjectStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryObjectStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
