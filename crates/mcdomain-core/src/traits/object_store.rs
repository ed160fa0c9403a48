// # Object Store Trait
//
// Defines the interface for the backing object store.
//
// ## Purpose
//
// The store holds every DomainOwner, Cluster and EndpointSlice. The
// reconciler only ever reads it (through the `ObjectQuery` supertrait);
// the engine applies the reconciler's `Effects` through the async write
// half defined here.
//
// ## Implementations
//
// - In-memory: `MemoryObjectStore`
// - File-backed snapshot: `FileObjectStore`

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::model::{Kind, Object, ObjectKey};
use crate::reconcile::Effects;
use crate::traits::query::ObjectQuery;

/// Trait for object store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Garbage Collection
///
/// Deleting an object also deletes every object whose owner references
/// point at it, transitively. This is what removes an EndpointSlice when
/// its DomainOwner goes away; the reconciler never observes that deletion.
#[async_trait]
pub trait ObjectStore: ObjectQuery {
    /// Create or fully replace an object
    ///
    /// # Returns
    ///
    /// - `Ok(Object)`: The stored object, with its new resource version
    /// - `Err(Error)`: Storage error
    async fn persist(&self, object: Object) -> Result<Object, crate::Error>;

    /// Delete an object and everything it owns
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<ObjectKey>)`: Keys removed (empty if it didn't exist)
    /// - `Err(Error)`: Storage error
    async fn delete(&self, key: &ObjectKey) -> Result<Vec<ObjectKey>, crate::Error>;

    /// List every object of a kind, across namespaces
    async fn list(&self, kind: Kind) -> Result<Vec<Object>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Apply a reconciler's effects: persists first, then deletes
    ///
    /// Stops at the first failing write. Effects are full replacements and
    /// deletions, so re-applying the same value after a partial failure
    /// converges.
    async fn apply(&self, effects: &Effects) -> Result<(), crate::Error> {
        for object in &effects.persists {
            self.persist(object.clone()).await?;
        }
        for object in &effects.deletes {
            self.delete(&object.key()).await?;
        }
        Ok(())
    }
}

/// Helper trait for constructing object stores from configuration
#[async_trait]
pub trait ObjectStoreFactory: Send + Sync {
    /// Create an ObjectStore instance from configuration
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, crate::Error>;
}
