// # Trigger Mapper Trait
//
// Maps a change to a watched object onto the DomainOwners that must be
// reconciled because of it.
//
// ## Built-in mappers
//
// - `OwnSelf`: a DomainOwner change reconciles that DomainOwner
// - `NamespaceFanout`: a Cluster change reconciles every DomainOwner in the
//   Cluster's namespace
//
// Mappers are registered per watched kind in a `TriggerRegistry` at engine
// setup time.

use crate::model::{Kind, Object, ObjectKey};
use crate::traits::query::{ObjectQuery, Query, QueryResult};

/// Derives the declaration keys affected by a watched-object change
///
/// Mappers are read-only: they may query the store (e.g. to list
/// declarations in a namespace) but never write.
pub trait TriggerMapper: Send + Sync {
    /// Keys of the declarations to reconcile after `object` changed
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<ObjectKey>)`: Affected declarations (may be empty)
    /// - `Err(Error)`: The store query failed
    fn affected(
        &self,
        object: &Object,
        query: &dyn ObjectQuery,
    ) -> Result<Vec<ObjectKey>, crate::Error>;
}

impl<F> TriggerMapper for F
where
    F: Fn(&Object, &dyn ObjectQuery) -> Result<Vec<ObjectKey>, crate::Error> + Send + Sync,
{
    fn affected(
        &self,
        object: &Object,
        query: &dyn ObjectQuery,
    ) -> Result<Vec<ObjectKey>, crate::Error> {
        self(object, query)
    }
}

/// A changed object reconciles itself
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnSelf;

impl TriggerMapper for OwnSelf {
    fn affected(
        &self,
        object: &Object,
        _query: &dyn ObjectQuery,
    ) -> Result<Vec<ObjectKey>, crate::Error> {
        Ok(vec![object.key()])
    }
}

/// A changed object reconciles every object of `target` kind in its namespace
#[derive(Debug, Clone, Copy)]
pub struct NamespaceFanout {
    /// Kind of the objects to reconcile
    pub target: Kind,
}

impl TriggerMapper for NamespaceFanout {
    fn affected(
        &self,
        object: &Object,
        query: &dyn ObjectQuery,
    ) -> Result<Vec<ObjectKey>, crate::Error> {
        let namespace = &object.meta().namespace;
        match query.query(&Query::list(self.target, namespace))? {
            QueryResult::Many(objects) => Ok(objects.iter().map(Object::key).collect()),
            QueryResult::One(object) => Ok(vec![object.key()]),
            QueryResult::NotFound => Ok(Vec::new()),
        }
    }
}
