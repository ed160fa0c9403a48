// # mcdomain-core
//
// Core library for multi-cluster domain ownership reconciliation.
//
// ## Architecture Overview
//
// A DomainOwner declares a DNS domain and a label selector over Cluster
// records. This library keeps one EndpointSlice per DomainOwner listing the
// gateway address of every matching cluster in the DomainOwner's namespace:
//
// - **reconcile()**: synchronous core that reads through `ObjectQuery` and
//   returns `Effects` (persist/delete), never writing itself
// - **ObjectStore**: trait for the backing store effects are applied to
// - **TriggerRegistry**: explicit mapping from watched kinds to affected
//   DomainOwners, plus store factories
// - **ReconcileEngine**: consumes watch events, deduplicates keys, runs the
//   core, applies effects and retries failures
//
// ## Design Principles
//
// 1. **Pure core**: reconciliation is a function of the store contents
// 2. **Event-Driven**: watch events arrive as async streams
// 3. **Plugin-Based**: stores and triggers are registered, no hard-coded if-else
// 4. **Library-First**: all functionality can be used as a library
// 5. **Idempotency**: re-running a reconciliation converges to the same state

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod selector;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, McdomainConfig, ReconcilerConfig, RetryPolicy, StoreConfig};
pub use engine::{EngineEvent, ReconcileEngine, WatchEvent};
pub use error::{Error, Result};
pub use model::{Cluster, DomainOwner, EndpointSlice, Kind, Object, ObjectKey};
pub use reconcile::{Effects, reconcile};
pub use registry::TriggerRegistry;
pub use store::{FileObjectStore, MemoryObjectStore};
pub use traits::{ObjectQuery, ObjectStore, TriggerMapper};
