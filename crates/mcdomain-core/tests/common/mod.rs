//! Test doubles and common utilities for contract tests
//!
//! The doubles wrap a real `MemoryObjectStore` so the engine and the
//! reconciler see genuine query semantics, while tests observe and inject
//! failures at the store boundary.

#![allow(dead_code)]

use async_trait::async_trait;
use mcdomain_core::config::{McdomainConfig, RetryPolicy};
use mcdomain_core::engine::{EngineEvent, ReconcileEngine};
use mcdomain_core::error::{Error, Result};
use mcdomain_core::model::{EndpointSlice, Kind, Object, ObjectKey};
use mcdomain_core::reconcile::Effects;
use mcdomain_core::registry::TriggerRegistry;
use mcdomain_core::store::MemoryObjectStore;
use mcdomain_core::traits::{ObjectQuery, ObjectStore, Query, QueryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A store that counts calls and fails reads on demand
///
/// Clones share counters, failure scripts and the underlying objects.
#[derive(Clone, Default)]
pub struct ScriptedStore {
    inner: MemoryObjectStore,
    /// Queries per kind
    query_counts: Arc<Mutex<HashMap<Kind, usize>>>,
    /// Remaining forced failures per queried kind
    failures: Arc<Mutex<HashMap<Kind, usize>>>,
    /// Call counter for persist()
    persist_call_count: Arc<AtomicUsize>,
    /// Call counter for delete()
    delete_call_count: Arc<AtomicUsize>,
    /// Call counter for flush()
    flush_call_count: Arc<AtomicUsize>,
}

impl ScriptedStore {
    pub fn with_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        Self {
            inner: MemoryObjectStore::with_objects(objects),
            ..Self::default()
        }
    }

    /// Fail the next `times` queries for `kind` with a store error
    pub fn fail_queries(&self, kind: Kind, times: usize) {
        self.failures.lock().unwrap().insert(kind, times);
    }

    /// Number of queries made for `kind`
    pub fn query_count(&self, kind: Kind) -> usize {
        self.query_counts
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    /// Number of queries made for any kind
    pub fn total_queries(&self) -> usize {
        self.query_counts.lock().unwrap().values().sum()
    }

    pub fn persist_call_count(&self) -> usize {
        self.persist_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }

    /// The underlying memory store
    pub fn memory(&self) -> &MemoryObjectStore {
        &self.inner
    }
}

impl ObjectQuery for ScriptedStore {
    fn query(&self, query: &Query) -> Result<QueryResult> {
        *self
            .query_counts
            .lock()
            .unwrap()
            .entry(query.kind)
            .or_default() += 1;

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&query.kind)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::store(format!("{} backend unavailable", query.kind)));
        }
        drop(failures);

        self.inner.query(query)
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn persist(&self, object: Object) -> Result<Object> {
        self.persist_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.persist(object).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<Vec<ObjectKey>> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn list(&self, kind: Kind) -> Result<Vec<Object>> {
        self.inner.list(kind).await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// A read-only view that returns collections in reverse store order
pub struct ReversedQuery<'a, Q: ObjectQuery + ?Sized>(pub &'a Q);

impl<Q: ObjectQuery + ?Sized> ObjectQuery for ReversedQuery<'_, Q> {
    fn query(&self, query: &Query) -> Result<QueryResult> {
        match self.0.query(query)? {
            QueryResult::Many(mut objects) => {
                objects.reverse();
                Ok(QueryResult::Many(objects))
            }
            other => Ok(other),
        }
    }
}

/// Configuration with immediate retries, for fast tests
pub fn fast_config(max_retries: usize) -> McdomainConfig {
    let mut config = McdomainConfig::default();
    config.engine.retry = RetryPolicy {
        max_retries,
        initial_backoff_ms: 0,
        max_backoff_ms: 0,
        multiplier: 1.0,
    };
    config.engine.event_channel_capacity = 100;
    config
}

/// Engine over `store` with the default triggers
pub fn engine_for(
    store: &ScriptedStore,
    config: McdomainConfig,
) -> (ReconcileEngine, mpsc::Receiver<EngineEvent>) {
    ReconcileEngine::new(
        Arc::new(store.clone()),
        Arc::new(TriggerRegistry::with_defaults()),
        config,
    )
    .expect("engine construction succeeds")
}

/// Every engine event emitted so far
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Keys the engine reconciled successfully, in order
pub fn succeeded_keys(events: &[EngineEvent]) -> Vec<ObjectKey> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::ReconcileSucceeded { key, .. } => Some(key.clone()),
            _ => None,
        })
        .collect()
}

/// Addresses of the EndpointSlice `namespace/name`, or `None` if absent
pub fn slice_addresses<Q: ObjectQuery + ?Sized>(
    query: &Q,
    namespace: &str,
    name: &str,
) -> Option<Vec<String>> {
    match query.query(&Query::get(Kind::EndpointSlice, namespace, name)) {
        Ok(QueryResult::One(object)) => {
            let slice = object.into_resource::<EndpointSlice>()?;
            Some(slice.addresses().map(str::to_string).collect())
        }
        _ => None,
    }
}

/// Addresses persisted by `effects`, if it persists exactly one slice
pub fn persisted_addresses(effects: &Effects) -> Option<Vec<String>> {
    match effects.persists.as_slice() {
        [object] => {
            let slice = object.clone().into_resource::<EndpointSlice>()?;
            Some(slice.addresses().map(str::to_string).collect())
        }
        _ => None,
    }
}
