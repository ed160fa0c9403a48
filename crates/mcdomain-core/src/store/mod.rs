// # Object Store Implementations
//
// This module provides implementations of the ObjectStore trait for
// different persistence strategies. Both keep their objects in an
// `ObjectTable`, which owns query filtering, resource versions and
// owner-reference garbage collection so every store behaves the same.

pub mod file;
pub mod memory;

pub use file::{FileObjectStore, FileObjectStoreFactory};
pub use memory::{MemoryObjectStore, MemoryObjectStoreFactory};

use std::collections::BTreeMap;

use crate::model::{Kind, Object, ObjectKey};
use crate::traits::{Query, QueryResult};

/// Objects indexed by key
#[derive(Debug, Clone, Default)]
pub(crate) struct ObjectTable {
    objects: BTreeMap<ObjectKey, Object>,
    revision: u64,
}

impl ObjectTable {
    /// Build a table from loaded objects, keeping their resource versions
    pub(crate) fn from_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        let mut table = Self::default();
        for object in objects {
            let revision = object
                .meta()
                .resource_version
                .as_deref()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            table.revision = table.revision.max(revision);
            table.objects.insert(object.key(), object);
        }
        table
    }

    pub(crate) fn query(&self, query: &Query) -> QueryResult {
        match &query.name {
            Some(name) => {
                let key = ObjectKey::new(query.kind, &query.namespace, name);
                match self.objects.get(&key) {
                    Some(object) if query.matches(object) => QueryResult::One(object.clone()),
                    _ => QueryResult::NotFound,
                }
            }
            None => QueryResult::Many(
                self.objects
                    .values()
                    .filter(|object| query.matches(object))
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// Insert or replace, stamping a new resource version
    pub(crate) fn insert(&mut self, mut object: Object) -> Object {
        self.revision += 1;
        object.meta_mut().resource_version = Some(self.revision.to_string());
        self.objects.insert(object.key(), object.clone());
        object
    }

    /// Remove an object and, transitively, everything that it owns
    pub(crate) fn remove_cascade(&mut self, key: &ObjectKey) -> Vec<ObjectKey> {
        let mut removed = Vec::new();
        let mut pending = vec![key.clone()];

        while let Some(key) = pending.pop() {
            let Some(owner) = self.objects.remove(&key) else {
                continue;
            };
            let owner_meta = owner.meta();
            let kind = owner.kind().as_str();

            pending.extend(
                self.objects
                    .values()
                    .filter(|object| object.meta().namespace == owner_meta.namespace)
                    .filter(|object| {
                        object.meta().owner_references.iter().any(|owner_ref| {
                            owner_ref.refers_to(kind, &owner_meta.name, owner_meta.uid.as_deref())
                        })
                    })
                    .map(Object::key),
            );
            removed.push(key);
        }

        removed
    }

    pub(crate) fn list(&self, kind: Kind) -> Vec<Object> {
        self.objects
            .values()
            .filter(|object| object.kind() == kind)
            .cloned()
            .collect()
    }

    pub(crate) fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}
