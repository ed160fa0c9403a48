//! Object metadata shared by every kind

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and bookkeeping fields carried by every object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name, unique per kind within a namespace
    pub name: String,

    /// Namespace the object lives in
    pub namespace: String,

    /// Unique id assigned by whoever created the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Opaque version bumped by the store on every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Labels used by selectors
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Objects this object belongs to (used for garbage collection)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Create metadata with just a namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Set the uid
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Back-reference from an owned object to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// API group/version of the owner
    pub api_version: String,
    /// Kind of the owner
    pub kind: String,
    /// Name of the owner (same namespace as the owned object)
    pub name: String,
    /// Uid of the owner, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl OwnerReference {
    /// Whether this reference points at the given owner
    ///
    /// Uids are compared only when both sides carry one.
    pub fn refers_to(&self, kind: &str, name: &str, uid: Option<&str>) -> bool {
        if self.kind != kind || self.name != name {
            return false;
        }
        match (self.uid.as_deref(), uid) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }
}
