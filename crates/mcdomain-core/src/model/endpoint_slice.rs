//! EndpointSlice: the gateway addresses published for one DomainOwner

use serde::{Deserialize, Serialize};

use super::{Kind, ObjectMeta, Resource};

/// What kind of address an EndpointSlice holds
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressType {
    /// IPv4 literals
    IPv4,
    /// IPv6 literals
    IPv6,
    /// Fully-qualified domain names
    #[default]
    FQDN,
}

/// A group of addresses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Addresses of this endpoint
    pub addresses: Vec<String>,
}

/// Set of endpoint addresses owned by a DomainOwner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSlice {
    /// Object metadata
    pub metadata: ObjectMeta,

    /// Kind of address in `endpoints`
    #[serde(default)]
    pub address_type: AddressType,

    /// Endpoints (one entry holding every gateway address when written by
    /// the reconciler)
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl EndpointSlice {
    /// Create an empty slice
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            address_type: AddressType::default(),
            endpoints: Vec::new(),
        }
    }

    /// All addresses across endpoints, in stored order
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.endpoints
            .iter()
            .flat_map(|endpoint| endpoint.addresses.iter().map(String::as_str))
    }
}

impl Resource for EndpointSlice {
    const KIND: Kind = Kind::EndpointSlice;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
