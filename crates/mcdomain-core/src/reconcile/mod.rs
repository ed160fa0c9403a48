//! DomainOwner reconciliation
//!
//! [`reconcile`] derives the EndpointSlice a DomainOwner should have from
//! the clusters that currently own it, compares that with what exists, and
//! returns the [`Effects`] needed to converge. It performs at most two
//! reads through the query capability and no writes: applying the effects
//! is the caller's job.
//!
//! ## Decision table
//!
//! | Matching clusters | Existing slice | Effect                     |
//! |-------------------|----------------|----------------------------|
//! | none              | no             | nothing                    |
//! | none              | yes            | delete the slice           |
//! | some              | no             | persist a new slice        |
//! | some              | yes            | persist a full replacement |
//!
//! The last row always rewrites the slice, even when the addresses are
//! unchanged. Persisting is a full replacement, so a redundant write is
//! harmless and no comparison of address sets is needed.

pub mod address;
pub mod desired;
pub mod lookup;

pub use address::{DEFAULT_SUFFIX, gateway_address};
pub use desired::SCATTER_LABEL;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::model::{Cluster, DomainOwner, EndpointSlice, Object, Resource};
use crate::selector;
use crate::traits::ObjectQuery;

/// Writes and deletes a reconciliation asks for
///
/// Both lists empty means there is nothing to do. Persists are full
/// replacements, never patches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effects {
    /// Objects to create or fully replace
    #[serde(default)]
    pub persists: Vec<Object>,

    /// Objects to delete
    #[serde(default)]
    pub deletes: Vec<Object>,
}

impl Effects {
    /// No effects
    pub fn none() -> Self {
        Self::default()
    }

    /// A single persist
    pub fn persist(object: impl Into<Object>) -> Self {
        Self {
            persists: vec![object.into()],
            deletes: Vec::new(),
        }
    }

    /// A single delete
    pub fn delete(object: impl Into<Object>) -> Self {
        Self {
            persists: Vec::new(),
            deletes: vec![object.into()],
        }
    }

    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.persists.is_empty() && self.deletes.is_empty()
    }
}

/// Which row of the decision table applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No clusters and no slice
    Noop,
    /// No clusters, slice exists
    Delete,
    /// Clusters, no slice yet
    Create,
    /// Clusters, slice exists
    Replace,
}

impl Decision {
    /// Pick the row for a membership/existence combination
    pub fn decide(has_members: bool, has_existing: bool) -> Self {
        match (has_members, has_existing) {
            (false, false) => Decision::Noop,
            (false, true) => Decision::Delete,
            (true, false) => Decision::Create,
            (true, true) => Decision::Replace,
        }
    }
}

/// Reconcile one DomainOwner against the current store contents
///
/// # Errors
///
/// - [`crate::Error::MalformedSelector`]: `spec.owners` cannot be compiled;
///   no query is made.
/// - [`crate::Error::Lookup`]: a query failed; the store error is kept as
///   the source.
///
/// On error no effects are returned at all.
pub fn reconcile<Q>(owner: &DomainOwner, query: &Q, config: &ReconcilerConfig) -> Result<Effects>
where
    Q: ObjectQuery + ?Sized,
{
    let key = owner.key();
    debug!("Reconciling {}", key);

    let matcher = selector::resolve(owner.spec.owners.as_ref())?;
    debug!("Cluster selector for {}: {}", key, matcher);

    let clusters = lookup::member_clusters(query, &owner.metadata.namespace, &matcher)?;
    debug!("Found {} matching cluster(s) for {}", clusters.len(), key);

    let existing = lookup::existing_slice(query, owner)?;

    Ok(reduce(owner, &clusters, existing, config))
}

/// Decide the effects from already-fetched inputs
///
/// Pure: the same inputs always produce the same effects.
pub fn reduce(
    owner: &DomainOwner,
    clusters: &[Cluster],
    existing: Option<EndpointSlice>,
    config: &ReconcilerConfig,
) -> Effects {
    let key = owner.key();

    match Decision::decide(!clusters.is_empty(), existing.is_some()) {
        Decision::Noop => {
            debug!("No clusters and no existing EndpointSlice for {}, nothing to do", key);
            Effects::none()
        }
        Decision::Delete => {
            let Some(slice) = existing else {
                return Effects::none();
            };
            info!("No clusters own {}, deleting EndpointSlice", key);
            Effects::delete(slice)
        }
        decision @ (Decision::Create | Decision::Replace) => {
            let addresses = clusters
                .iter()
                .map(|cluster| address::gateway_address(cluster, &config.gateway_suffix))
                .collect();
            let slice = desired::build(owner, addresses, existing);
            info!(
                "{} EndpointSlice for {} with {} address(es)",
                if decision == Decision::Create { "Creating" } else { "Replacing" },
                key,
                slice.addresses().count()
            );
            Effects::persist(slice)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddressType, LabelSelector};

    fn config() -> ReconcilerConfig {
        ReconcilerConfig::default()
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(Decision::decide(false, false), Decision::Noop);
        assert_eq!(Decision::decide(false, true), Decision::Delete);
        assert_eq!(Decision::decide(true, false), Decision::Create);
        assert_eq!(Decision::decide(true, true), Decision::Replace);
    }

    #[test]
    fn test_reduce_noop() {
        let owner = DomainOwner::new("ns1", "shop");
        assert!(reduce(&owner, &[], None, &config()).is_empty());
    }

    #[test]
    fn test_reduce_delete_existing() {
        let owner = DomainOwner::new("ns1", "shop");
        let existing = EndpointSlice::new("ns1", "shop");

        let effects = reduce(&owner, &[], Some(existing.clone()), &config());
        assert_eq!(effects, Effects::delete(existing));
    }

    #[test]
    fn test_reduce_create_sorted() {
        let owner = DomainOwner::new("ns1", "shop");
        let clusters = [Cluster::new("ns1", "c2"), Cluster::new("ns1", "c1")];

        let effects = reduce(&owner, &clusters, None, &config());
        assert!(effects.deletes.is_empty());
        assert_eq!(effects.persists.len(), 1);

        let slice = effects.persists[0]
            .clone()
            .into_resource::<EndpointSlice>()
            .expect("persisted an EndpointSlice");
        assert_eq!(slice.address_type, AddressType::FQDN);
        assert_eq!(
            slice.addresses().collect::<Vec<_>>(),
            vec![
                "x.gateway.c1.ns1.xcc.test.clusters.xcc.test",
                "x.gateway.c2.ns1.xcc.test.clusters.xcc.test",
            ]
        );
    }

    #[test]
    fn test_reduce_replace_is_unconditional() {
        let owner = DomainOwner::new("ns1", "shop");
        let clusters = [Cluster::new("ns1", "c1")];

        let first = reduce(&owner, &clusters, None, &config());
        let existing = first.persists[0]
            .clone()
            .into_resource::<EndpointSlice>()
            .unwrap();

        // Same membership, slice already correct: still a full persist
        let second = reduce(&owner, &clusters, Some(existing), &config());
        assert_eq!(second, first);
    }

    #[test]
    fn test_reduce_uses_configured_suffix() {
        let owner = DomainOwner::new("ns1", "shop");
        let clusters = [Cluster::new("ns1", "c1")];
        let config = ReconcilerConfig {
            gateway_suffix: "mesh.internal".to_string(),
        };

        let effects = reduce(&owner, &clusters, None, &config);
        let slice = effects.persists[0]
            .clone()
            .into_resource::<EndpointSlice>()
            .unwrap();
        assert_eq!(
            slice.addresses().collect::<Vec<_>>(),
            vec!["x.gateway.c1.ns1.mesh.internal.clusters.mesh.internal"]
        );
    }

    #[test]
    fn test_reconcile_malformed_selector_makes_no_queries() {
        struct Unreachable;

        impl ObjectQuery for Unreachable {
            fn query(
                &self,
                query: &crate::traits::Query,
            ) -> Result<crate::traits::QueryResult> {
                panic!("unexpected query: {query}");
            }
        }

        let owner = DomainOwner::new("ns1", "shop").with_owners(
            LabelSelector::default().and_expression(crate::model::LabelSelectorRequirement::new(
                "env",
                crate::model::LabelSelectorOperator::NotIn,
                Vec::<String>::new(),
            )),
        );

        let err = reconcile(&owner, &Unreachable, &config()).unwrap_err();
        assert!(matches!(err, crate::Error::MalformedSelector(_)));
    }
}
