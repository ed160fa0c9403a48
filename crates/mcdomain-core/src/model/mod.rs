//! Typed object model
//!
//! Objects reach the reconciler as one of a small, closed set of kinds:
//!
//! - [`DomainOwner`]: the ownership declaration (input)
//! - [`Cluster`]: inventory record for a member cluster (input)
//! - [`EndpointSlice`]: gateway addresses for one declaration (output)
//!
//! [`Object`] is the kind-tagged union stores and effects carry around;
//! [`Resource`] gives typed access to a single kind.

pub mod cluster;
pub mod domain_owner;
pub mod endpoint_slice;
pub mod meta;
pub mod selector;

pub use cluster::Cluster;
pub use domain_owner::{DomainOwner, DomainOwnerSpec};
pub use endpoint_slice::{AddressType, Endpoint, EndpointSlice};
pub use meta::{ObjectMeta, OwnerReference};
pub use selector::{LabelSelector, LabelSelectorOperator, LabelSelectorRequirement};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of object the reconciler knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kind {
    /// Ownership declaration
    DomainOwner,
    /// Member cluster
    Cluster,
    /// Published gateway addresses
    EndpointSlice,
}

impl Kind {
    /// Every kind, in a stable order
    pub const ALL: [Kind; 3] = [Kind::DomainOwner, Kind::Cluster, Kind::EndpointSlice];

    /// Kind name as written in `kind` fields and owner references
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::DomainOwner => "DomainOwner",
            Kind::Cluster => "Cluster",
            Kind::EndpointSlice => "EndpointSlice",
        }
    }

    /// API group/version of the kind
    pub fn api_version(&self) -> &'static str {
        match self {
            Kind::DomainOwner => "fun.xcc/v1alpha1",
            Kind::Cluster => "cluster.x-k8s.io/v1alpha3",
            Kind::EndpointSlice => "discovery.k8s.io/v1beta1",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an object: kind, namespace and name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Kind of the object
    pub kind: Kind,
    /// Namespace of the object
    pub namespace: String,
    /// Name of the object
    pub name: String,
}

impl ObjectKey {
    /// Create a key
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Typed access to one kind of object
pub trait Resource: Clone + Into<Object> + TryFrom<Object, Error = Object> {
    /// Kind of this resource
    const KIND: Kind;

    /// Object metadata
    fn meta(&self) -> &ObjectMeta;

    /// Mutable object metadata
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Identity of this object
    fn key(&self) -> ObjectKey {
        let meta = self.meta();
        ObjectKey::new(Self::KIND, &meta.namespace, &meta.name)
    }
}

/// Any object, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    /// An ownership declaration
    DomainOwner(DomainOwner),
    /// A member cluster
    Cluster(Cluster),
    /// Published gateway addresses
    EndpointSlice(EndpointSlice),
}

impl Object {
    /// Kind of the wrapped object
    pub fn kind(&self) -> Kind {
        match self {
            Object::DomainOwner(_) => Kind::DomainOwner,
            Object::Cluster(_) => Kind::Cluster,
            Object::EndpointSlice(_) => Kind::EndpointSlice,
        }
    }

    /// Metadata of the wrapped object
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Object::DomainOwner(o) => &o.metadata,
            Object::Cluster(o) => &o.metadata,
            Object::EndpointSlice(o) => &o.metadata,
        }
    }

    /// Mutable metadata of the wrapped object
    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::DomainOwner(o) => &mut o.metadata,
            Object::Cluster(o) => &mut o.metadata,
            Object::EndpointSlice(o) => &mut o.metadata,
        }
    }

    /// Identity of the wrapped object
    pub fn key(&self) -> ObjectKey {
        let meta = self.meta();
        ObjectKey::new(self.kind(), &meta.namespace, &meta.name)
    }

    /// Convert into a typed resource, if the kind matches
    pub fn into_resource<R: Resource>(self) -> Option<R> {
        R::try_from(self).ok()
    }
}

macro_rules! object_variant {
    ($ty:ident) => {
        impl From<$ty> for Object {
            fn from(value: $ty) -> Self {
                Object::$ty(value)
            }
        }

        impl TryFrom<Object> for $ty {
            type Error = Object;

            fn try_from(object: Object) -> Result<Self, Self::Error> {
                match object {
                    Object::$ty(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

object_variant!(DomainOwner);
object_variant!(Cluster);
object_variant!(EndpointSlice);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_json_is_kind_tagged() {
        let object = Object::from(Cluster::new("ns1", "c1").with_label("env", "prod"));
        let json = serde_json::to_value(&object).unwrap();

        assert_eq!(json["kind"], "Cluster");
        assert_eq!(json["metadata"]["namespace"], "ns1");

        let parsed: Object = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, object);
    }

    #[test]
    fn test_domain_owner_from_json() {
        let object: Object = serde_json::from_value(serde_json::json!({
            "kind": "DomainOwner",
            "metadata": { "name": "shop", "namespace": "ns1", "uid": "u-1" },
            "spec": { "domain": "shop.example", "owners": { "matchLabels": { "env": "prod" } } }
        }))
        .unwrap();

        let owner: DomainOwner = object.into_resource().expect("is a DomainOwner");
        assert_eq!(owner.spec.domain, "shop.example");
        assert!(owner.spec.owners.is_some());
        assert_eq!(owner.key(), ObjectKey::new(Kind::DomainOwner, "ns1", "shop"));
    }

    #[test]
    fn test_into_resource_wrong_kind() {
        let object = Object::from(Cluster::new("ns1", "c1"));
        assert!(object.into_resource::<EndpointSlice>().is_none());
    }

    #[test]
    fn test_key_display() {
        let key = ObjectKey::new(Kind::EndpointSlice, "ns1", "shop");
        assert_eq!(key.to_string(), "EndpointSlice ns1/shop");
    }
}
