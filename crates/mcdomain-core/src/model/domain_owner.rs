//! DomainOwner: the ownership declaration for a DNS domain

use serde::{Deserialize, Serialize};

use super::{Kind, LabelSelector, ObjectMeta, OwnerReference, Resource};

/// Desired state of a DomainOwner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainOwnerSpec {
    /// DNS suffix this declaration is about (informational)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,

    /// Which clusters may serve the domain; absent means all clusters
    /// in the declaration's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<LabelSelector>,
}

/// Declares which clusters serve a DNS domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainOwner {
    /// Object metadata
    pub metadata: ObjectMeta,

    /// Desired state
    #[serde(default)]
    pub spec: DomainOwnerSpec,
}

impl DomainOwner {
    /// Create a declaration with no selector
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: DomainOwnerSpec::default(),
        }
    }

    /// Set the uid
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.metadata.uid = Some(uid.into());
        self
    }

    /// Set the domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.spec.domain = domain.into();
        self
    }

    /// Set the owners selector
    pub fn with_owners(mut self, owners: LabelSelector) -> Self {
        self.spec.owners = Some(owners);
        self
    }

    /// Owner reference pointing back at this declaration
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: Self::KIND.api_version().to_string(),
            kind: Self::KIND.as_str().to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
        }
    }
}

impl Resource for DomainOwner {
    const KIND: Kind = Kind::DomainOwner;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
