//! Cluster: one member cluster of the fleet
//!
//! Only identity and labels are read; the rest of a Cluster belongs to the
//! inventory that manages it.

use serde::{Deserialize, Serialize};

use super::{Kind, ObjectMeta, Resource};

/// Inventory record for a member cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Object metadata
    pub metadata: ObjectMeta,
}

impl Cluster {
    /// Create a cluster record
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }
}

impl Resource for Cluster {
    const KIND: Kind = Kind::Cluster;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
