//! Trigger and store registry
//!
//! The registry is built once at setup time and handed to the engine. It
//! answers two questions without any hardcoded if-else chains:
//!
//! - which declarations must be reconciled when an object of a given kind
//!   changes (trigger mappers)
//! - how to build the object store named in the configuration (store
//!   factories)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcdomain_core::config::StoreConfig;
//! use mcdomain_core::registry::TriggerRegistry;
//!
//! # async fn try_main() -> mcdomain_core::Result<()> {
//! // DomainOwner -> itself, Cluster -> every DomainOwner in its namespace,
//! // plus the "file" and "memory" stores
//! let registry = TriggerRegistry::with_defaults();
//!
//! let store = registry.create_store(&StoreConfig::Memory).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom triggers
//!
//! Any `Fn(&Object, &dyn ObjectQuery) -> Result<Vec<ObjectKey>>` is a
//! mapper:
//!
//! ```rust
//! # use mcdomain_core::model::{Kind, Object, ObjectKey};
//! # use mcdomain_core::registry::TriggerRegistry;
//! # use mcdomain_core::traits::ObjectQuery;
//! let registry = TriggerRegistry::new();
//! registry.register_trigger(
//!     Kind::EndpointSlice,
//!     Box::new(|object: &Object, _query: &dyn ObjectQuery| {
//!         let meta = object.meta();
//!         Ok::<_, mcdomain_core::Error>(vec![ObjectKey::new(
//!             Kind::DomainOwner,
//!             &meta.namespace,
//!             &meta.name,
//!         )])
//!     }),
//! );
//! assert!(registry.has_trigger(Kind::EndpointSlice));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::model::{Kind, Object, ObjectKey};
use crate::store::{FileObjectStoreFactory, MemoryObjectStoreFactory};
use crate::traits::{NamespaceFanout, ObjectQuery, ObjectStore, ObjectStoreFactory, OwnSelf};
use crate::traits::TriggerMapper;

/// Registry of trigger mappers and store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. Poisoned locks are recovered.
#[derive(Default)]
pub struct TriggerRegistry {
    /// Mappers per watched kind, applied in registration order
    triggers: RwLock<BTreeMap<Kind, Vec<Arc<dyn TriggerMapper>>>>,

    /// Registered object store factories
    stores: RwLock<HashMap<String, Arc<dyn ObjectStoreFactory>>>,
}

impl TriggerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry wired for DomainOwner reconciliation
    ///
    /// - DomainOwner changes reconcile that DomainOwner
    /// - Cluster changes reconcile every DomainOwner in the same namespace
    /// - `file` and `memory` store factories
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_trigger(Kind::DomainOwner, Box::new(OwnSelf));
        registry.register_trigger(
            Kind::Cluster,
            Box::new(NamespaceFanout {
                target: Kind::DomainOwner,
            }),
        );
        registry.register_store("file", Box::new(FileObjectStoreFactory));
        registry.register_store("memory", Box::new(MemoryObjectStoreFactory));
        registry
    }

    /// Register a trigger mapper for a watched kind
    ///
    /// Several mappers may be registered for one kind; their results are
    /// merged.
    pub fn register_trigger(&self, kind: Kind, mapper: Box<dyn TriggerMapper>) {
        let mut triggers = self.triggers.write().unwrap_or_else(PoisonError::into_inner);
        triggers.entry(kind).or_default().push(Arc::from(mapper));
    }

    /// Register an object store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name as returned by [`StoreConfig::type_name`]
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn ObjectStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Declarations affected by a change to `object`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<ObjectKey>)`: Sorted, deduplicated keys (empty when no
    ///   mapper is registered for the object's kind)
    /// - `Err(Error)`: A mapper's query failed
    pub fn affected(&self, object: &Object, query: &dyn ObjectQuery) -> Result<Vec<ObjectKey>> {
        let mappers = {
            let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
            triggers.get(&object.kind()).cloned().unwrap_or_default()
        };

        let mut keys = Vec::new();
        for mapper in mappers {
            keys.extend(mapper.affected(object, query)?);
        }
        keys.sort();
        keys.dedup();

        debug!("{} triggers {} declaration(s)", object.key(), keys.len());
        Ok(keys)
    }

    /// Create an object store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn ObjectStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn ObjectStore>> {
        config.validate()?;

        let store_type = config.type_name();
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        // Lock released before the async create
        factory.create(config).await
    }

    /// Kinds with at least one registered trigger
    pub fn watched_kinds(&self) -> Vec<Kind> {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        triggers.keys().copied().collect()
    }

    /// Check if a kind has a registered trigger
    pub fn has_trigger(&self, kind: Kind) -> bool {
        let triggers = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        triggers.contains_key(&kind)
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
