//! Reconciliation engine
//!
//! The ReconcileEngine is responsible for:
//! - Consuming watch events for DomainOwners and Clusters
//! - Mapping each event to the DomainOwners it affects (via the registry)
//! - Running the reconciler once per pending DomainOwner
//! - Applying the resulting effects to the object store
//! - Retrying failed reconciliations under the configured policy
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ WatchEvent  │─── Applied / Deleted ───┐
//! │   stream    │                         │
//! └─────────────┘                         ▼
//!                               ┌──────────────────┐
//!                               │ ReconcileEngine  │
//!                               └──────────────────┘
//!                                         │
//!         ┌───────────────────────────────┼─────────────────────────┐
//!         │                               │                         │
//!         ▼                               ▼                         ▼
//! ┌─────────────────┐           ┌──────────────────┐        ┌─────────────┐
//! │ TriggerRegistry │           │ reconcile()      │        │   Events    │
//! │ (affected keys) │           │ + ObjectStore    │        │  (notify)   │
//! └─────────────────┘           └──────────────────┘        └─────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. Watch event received
//! 2. Registry maps it to DomainOwner keys; keys already pending are dropped
//! 3. For each pending key, fetch the DomainOwner (gone means skip)
//! 4. Run `reconcile()` and apply the effects
//! 5. On retryable failure, back off and try again
//! 6. Emit event for monitoring/logging
//!
//! Steps 2 and 4 share the retry policy. A shutdown signal received while
//! backing off ends the engine without further attempts.

use std::collections::{BTreeSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::config::{McdomainConfig, ReconcilerConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::model::{DomainOwner, Kind, Object, ObjectKey};
use crate::reconcile;
use crate::registry::TriggerRegistry;
use crate::traits::{ObjectQuery, ObjectStore, Query, QueryResult};

/// A change observed on a watched object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Object was created or updated
    Applied(Object),
    /// Object was removed
    Deleted(Object),
}

impl WatchEvent {
    /// The object the event is about
    pub fn object(&self) -> &Object {
        match self {
            WatchEvent::Applied(object) | WatchEvent::Deleted(object) => object,
        }
    }
}

/// Events emitted by the ReconcileEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        /// DomainOwners in the store at startup
        declarations: usize,
    },

    /// A DomainOwner was reconciled and its effects applied
    ReconcileSucceeded {
        key: ObjectKey,
        persisted: usize,
        deleted: usize,
    },

    /// Nothing to reconcile for the key
    ReconcileSkipped { key: ObjectKey, reason: String },

    /// A watched object could not be mapped to DomainOwners
    TriggerFailed {
        /// The watched object
        key: ObjectKey,
        error: String,
        attempts: usize,
    },

    /// Reconciliation failed for good
    ReconcileFailed {
        key: ObjectKey,
        error: String,
        /// Attempts made, including the first
        attempts: usize,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// What a single successful attempt did
enum Outcome {
    Applied { persisted: usize, deleted: usize },
    Gone,
}

/// Keys waiting to be reconciled, in arrival order, each at most once
#[derive(Debug, Default)]
struct PendingKeys {
    order: VecDeque<ObjectKey>,
    queued: BTreeSet<ObjectKey>,
}

impl PendingKeys {
    /// Queue a key; returns false if it was already pending
    fn push(&mut self, key: ObjectKey) -> bool {
        if !self.queued.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        true
    }

    fn pop(&mut self) -> Option<ObjectKey> {
        let key = self.order.pop_front()?;
        self.queued.remove(&key);
        Some(key)
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

type ShutdownSignal = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A shutdown signal that can be awaited any number of times
struct Shutdown {
    signal: ShutdownSignal,
    received: bool,
}

impl Shutdown {
    fn new(signal: ShutdownSignal) -> Self {
        Self {
            signal,
            received: false,
        }
    }

    fn never() -> Self {
        Self::new(Box::pin(std::future::pending::<()>()))
    }

    /// Resolves once the signal has fired
    async fn recv(&mut self) {
        if !self.received {
            (&mut self.signal).await;
            self.received = true;
        }
    }

    /// Sleep for `delay`; false if the signal fired first
    async fn sleep(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.recv() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileEngine::new()`]
/// 2. Start with [`ReconcileEngine::run()`] and a stream of watch events
/// 3. Engine runs until the stream ends and nothing is pending, or a
///    shutdown signal is received
/// 4. The store is flushed before `run()` returns
///
/// ## Threading
///
/// The engine processes one key at a time on the calling task, so at most
/// one reconciliation per DomainOwner is ever in flight.
///
/// ## Load Resistance
///
/// - **Key deduplication**: a burst of events for one namespace queues each
///   DomainOwner once
/// - **Bounded event channel**: when full, engine events are dropped (logged)
pub struct ReconcileEngine {
    /// Store the reconciler reads and effects are applied to
    store: Arc<dyn ObjectStore>,

    /// Maps watched objects to affected DomainOwners
    registry: Arc<TriggerRegistry>,

    /// Reconciler settings
    reconciler: ReconcilerConfig,

    /// Retry policy for failed reconciliations
    retry: RetryPolicy,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconcileEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: Arc<TriggerRegistry>,
        config: McdomainConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            store,
            registry,
            reconciler: config.reconciler,
            retry: config.engine.retry,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine until the event stream is drained or SIGINT arrives
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error (startup listing or final flush failed)
    pub async fn run<S>(&self, events: S) -> Result<()>
    where
        S: Stream<Item = WatchEvent> + Unpin + Send,
    {
        let shutdown: ShutdownSignal = Box::pin(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        });
        self.run_internal(events, Shutdown::new(shutdown)).await
    }

    /// Run the engine with an explicit shutdown signal
    ///
    /// With `None` the engine only stops when the stream is drained. The
    /// daemon uses this with its own SIGTERM/SIGINT handling; tests use it
    /// for deterministic shutdown.
    pub async fn run_with_shutdown<S>(
        &self,
        events: S,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()>
    where
        S: Stream<Item = WatchEvent> + Unpin + Send,
    {
        let shutdown: ShutdownSignal = match shutdown_rx {
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            None => Box::pin(std::future::pending::<()>()),
        };
        self.run_internal(events, Shutdown::new(shutdown)).await
    }

    async fn run_internal<S>(&self, mut events: S, mut shutdown: Shutdown) -> Result<()>
    where
        S: Stream<Item = WatchEvent> + Unpin + Send,
    {
        let declarations = self.store.list(Kind::DomainOwner).await?.len();
        info!("Engine started with {} DomainOwner(s)", declarations);
        self.emit_event(EngineEvent::Started { declarations });

        let mut pending = PendingKeys::default();
        let mut stream_open = true;

        // Main event loop
        let reason = loop {
            if !stream_open && pending.is_empty() {
                break "Watch stream ended";
            }

            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break "Shutdown signal";
                }

                // Drain ready events before reconciling so bursts coalesce
                next = events.next(), if stream_open => match next {
                    Some(event) => {
                        if !self.enqueue(&event, &mut pending, &mut shutdown).await {
                            break "Shutdown signal";
                        }
                    }
                    None => {
                        debug!("Watch stream closed, {} key(s) pending", pending.order.len());
                        stream_open = false;
                    }
                },

                _ = std::future::ready(()), if !pending.is_empty() => {
                    if let Some(key) = pending.pop() {
                        // Failures are reported through events; keep going
                        if self.reconcile_until(&key, &mut shutdown).await.is_none() {
                            break "Shutdown signal";
                        }
                    }
                }
            }
        };

        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });

        // Flush store before exiting
        self.store.flush().await?;
        info!("Store flushed, engine stopped");

        Ok(())
    }

    /// Map a watch event to DomainOwner keys and queue them
    ///
    /// Mapping can query the store, so it is retried like a reconciliation.
    /// Returns false if shutdown arrived while backing off.
    async fn enqueue(
        &self,
        event: &WatchEvent,
        pending: &mut PendingKeys,
        shutdown: &mut Shutdown,
    ) -> bool {
        let object = event.object();
        let source = object.key();
        debug!("Watch event for {}", source);

        let Some((result, attempts)) = self
            .with_retry(&source, shutdown, || {
                std::future::ready(self.registry.affected(object, &self.store))
            })
            .await
        else {
            return false;
        };

        match result {
            Ok(keys) => {
                for key in keys {
                    if !pending.push(key.clone()) {
                        debug!("{} already pending", key);
                    }
                }
            }
            Err(e) => {
                error!(
                    "Failed to map {} to DomainOwners after {} attempt(s): {}",
                    source, attempts, e
                );
                self.emit_event(EngineEvent::TriggerFailed {
                    key: source,
                    error: e.to_string(),
                    attempts,
                });
            }
        }
        true
    }

    /// Reconcile one DomainOwner with retry logic
    ///
    /// Retryable errors are retried up to `max_retries` times with
    /// exponential backoff. Non-retryable errors (malformed selectors)
    /// fail immediately.
    pub async fn reconcile_key(&self, key: &ObjectKey) -> Result<()> {
        self.reconcile_until(key, &mut Shutdown::never())
            .await
            .unwrap_or(Ok(()))
    }

    /// [`Self::reconcile_key`], giving up when shutdown arrives during a backoff
    async fn reconcile_until(&self, key: &ObjectKey, shutdown: &mut Shutdown) -> Option<Result<()>> {
        let (result, attempts) = self
            .with_retry(key, shutdown, || self.reconcile_once(key))
            .await?;

        Some(match result {
            Ok(Outcome::Applied { persisted, deleted }) => {
                debug!(
                    "Reconciled {} ({} persisted, {} deleted)",
                    key, persisted, deleted
                );
                self.emit_event(EngineEvent::ReconcileSucceeded {
                    key: key.clone(),
                    persisted,
                    deleted,
                });
                Ok(())
            }
            Ok(Outcome::Gone) => {
                debug!("{} no longer exists, skipping", key);
                self.emit_event(EngineEvent::ReconcileSkipped {
                    key: key.clone(),
                    reason: "DomainOwner not found".to_string(),
                });
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to reconcile {} after {} attempt(s): {}",
                    key, attempts, e
                );
                self.emit_event(EngineEvent::ReconcileFailed {
                    key: key.clone(),
                    error: e.to_string(),
                    attempts,
                });
                Err(e)
            }
        })
    }

    /// Run `op` under the retry policy
    ///
    /// Returns the last result and the attempts made, or `None` if shutdown
    /// arrived during a backoff.
    async fn with_retry<T, F, Fut>(
        &self,
        target: &ObjectKey,
        shutdown: &mut Shutdown,
        mut op: F,
    ) -> Option<(Result<T>, usize)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let result = op().await;
            let attempts = attempt + 1;
            match result {
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Attempt {} failed for {}: {}. Retrying in {:?}",
                        attempts, target, e, delay
                    );
                    if !shutdown.sleep(delay).await {
                        info!("Shutdown during backoff, abandoning {}", target);
                        return None;
                    }
                    attempt += 1;
                }
                result => return Some((result, attempts)),
            }
        }
    }

    /// A single reconcile-and-apply attempt
    async fn reconcile_once(&self, key: &ObjectKey) -> Result<Outcome> {
        if key.kind != Kind::DomainOwner {
            return Err(Error::config(format!("{} is not a DomainOwner", key)));
        }

        let query = Query::get(Kind::DomainOwner, &key.namespace, &key.name);
        let owner = match self
            .store
            .query(&query)
            .map_err(|e| Error::lookup(query.to_string(), e))?
        {
            QueryResult::One(object) => object.into_resource::<DomainOwner>().ok_or_else(|| {
                Error::lookup(
                    query.to_string(),
                    Error::store(format!("{} is not a DomainOwner", key)),
                )
            })?,
            QueryResult::NotFound => return Ok(Outcome::Gone),
            QueryResult::Many(objects) => {
                return Err(Error::lookup(
                    query.to_string(),
                    Error::store(format!(
                        "expected a single DomainOwner, got {} objects",
                        objects.len()
                    )),
                ));
            }
        };

        let effects = reconcile::reconcile(&owner, &*self.store, &self.reconciler)?;
        self.store.apply(&effects).await?;

        Ok(Outcome::Applied {
            persisted: effects.persists.len(),
            deleted: effects.deletes.len(),
        })
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cluster, EndpointSlice, Resource};
    use crate::store::MemoryObjectStore;

    fn engine(store: MemoryObjectStore) -> (ReconcileEngine, mpsc::Receiver<EngineEvent>) {
        ReconcileEngine::new(
            Arc::new(store),
            Arc::new(TriggerRegistry::with_defaults()),
            McdomainConfig::default(),
        )
        .unwrap()
    }

    fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_pending_keys_dedup() {
        let mut pending = PendingKeys::default();
        let a = ObjectKey::new(Kind::DomainOwner, "ns1", "a");
        let b = ObjectKey::new(Kind::DomainOwner, "ns1", "b");

        assert!(pending.push(b.clone()));
        assert!(pending.push(a.clone()));
        assert!(!pending.push(b.clone()));

        assert_eq!(pending.pop(), Some(b.clone()));
        // Popped keys can be queued again
        assert!(pending.push(b.clone()));
        assert_eq!(pending.pop(), Some(a));
        assert_eq!(pending.pop(), Some(b));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_run_creates_endpoint_slice() {
        let owner = DomainOwner::new("ns1", "shop").with_uid("u1");
        let cluster = Cluster::new("ns1", "c1");
        let store = MemoryObjectStore::with_objects([owner.clone().into(), cluster.clone().into()]);
        let (engine, mut rx) = engine(store.clone());

        let events = tokio_stream::iter(vec![WatchEvent::Applied(cluster.into())]);
        engine.run_with_shutdown(events, None).await.unwrap();

        let slice = store
            .query(&Query::get(Kind::EndpointSlice, "ns1", "shop"))
            .unwrap();
        let QueryResult::One(slice) = slice else {
            panic!("EndpointSlice not created");
        };
        let slice = slice.into_resource::<EndpointSlice>().unwrap();
        assert_eq!(
            slice.addresses().collect::<Vec<_>>(),
            vec!["x.gateway.c1.ns1.xcc.test.clusters.xcc.test"]
        );

        assert_eq!(
            drain(&mut rx),
            vec![
                EngineEvent::Started { declarations: 1 },
                EngineEvent::ReconcileSucceeded {
                    key: owner.key(),
                    persisted: 1,
                    deleted: 0,
                },
                EngineEvent::Stopped {
                    reason: "Watch stream ended".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_deleted_owner_is_skipped() {
        let owner = DomainOwner::new("ns1", "shop");
        let (engine, mut rx) = engine(MemoryObjectStore::new());

        let events = tokio_stream::iter(vec![WatchEvent::Deleted(owner.clone().into())]);
        engine.run_with_shutdown(events, None).await.unwrap();

        assert!(drain(&mut rx).contains(&EngineEvent::ReconcileSkipped {
            key: owner.key(),
            reason: "DomainOwner not found".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_idle_engine() {
        let (engine, mut rx) = engine(MemoryObjectStore::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (_watch_tx, watch_rx) = mpsc::unbounded_channel::<WatchEvent>();
        let events = tokio_stream::wrappers::UnboundedReceiverStream::new(watch_rx);

        shutdown_tx.send(()).unwrap();
        engine
            .run_with_shutdown(events, Some(shutdown_rx))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx).last(),
            Some(&EngineEvent::Stopped {
                reason: "Shutdown signal".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep_and_stays_received() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut shutdown = Shutdown::new(Box::pin(async move {
            let _ = rx.await;
        }));

        assert!(shutdown.sleep(Duration::ZERO).await);

        tx.send(()).unwrap();
        assert!(!shutdown.sleep(Duration::from_secs(60)).await);
        // Already fired; must not poll the finished signal again
        assert!(!shutdown.sleep(Duration::from_secs(60)).await);
    }

    #[test]
    fn test_watch_event_object() {
        let cluster: Object = Cluster::new("ns1", "c1").into();
        assert_eq!(WatchEvent::Deleted(cluster.clone()).object(), &cluster);
    }
}
