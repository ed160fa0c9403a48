//! Core traits for mcdomain
//!
//! This module defines the abstract interfaces the reconciler and engine
//! are written against.
//!
//! - [`ObjectQuery`]: Synchronous read-only query capability
//! - [`ObjectStore`]: Backing store the engine applies effects to
//! - [`TriggerMapper`]: Maps a watched-object change to declarations to reconcile

pub mod object_store;
pub mod query;
pub mod trigger;

pub use object_store::{ObjectStore, ObjectStoreFactory};
pub use query::{ObjectQuery, Query, QueryResult};
pub use trigger::{NamespaceFanout, OwnSelf, TriggerMapper};
