//! Contract Test: Lookup Failures
//!
//! This test verifies that store failures surface as a single error with
//! the cause attached, and never as partial effects.
//!
//! Constraints verified:
//! - A failing cluster lookup returns `Error::Lookup` with the store error
//!   as its source, and the existing-slice lookup is never attempted
//! - A failing existing-slice lookup returns `Error::Lookup` too
//! - A malformed selector fails before the store is touched
//!
//! If this test fails, someone has made the reconciler swallow errors or
//! fall back to an empty membership.

mod common;

use common::*;
use mcdomain_core::config::ReconcilerConfig;
use mcdomain_core::error::Error;
use mcdomain_core::model::{
    Cluster, DomainOwner, EndpointSlice, Kind, LabelSelector, LabelSelectorOperator,
    LabelSelectorRequirement,
};
use mcdomain_core::reconcile::reconcile;
use std::error::Error as _;

fn fleet() -> (DomainOwner, ScriptedStore) {
    let owner = DomainOwner::new("ns1", "shop");
    let store = ScriptedStore::with_objects([
        owner.clone().into(),
        Cluster::new("ns1", "c1").into(),
        EndpointSlice::new("ns1", "shop").into(),
    ]);
    (owner, store)
}

#[test]
fn failing_cluster_lookup_preserves_cause() {
    let (owner, store) = fleet();
    store.fail_queries(Kind::Cluster, 1);

    let err = reconcile(&owner, &store, &ReconcilerConfig::default())
        .expect_err("lookup failure propagates");

    assert!(matches!(err, Error::Lookup { .. }), "got {err:?}");
    let source = err.source().expect("lookup error keeps its cause");
    assert!(source.to_string().contains("Cluster backend unavailable"));

    // All-or-nothing: the second read never happens
    assert_eq!(store.query_count(Kind::Cluster), 1);
    assert_eq!(store.query_count(Kind::EndpointSlice), 0);
}

#[test]
fn failing_existing_slice_lookup_preserves_cause() {
    let (owner, store) = fleet();
    store.fail_queries(Kind::EndpointSlice, 1);

    let err = reconcile(&owner, &store, &ReconcilerConfig::default())
        .expect_err("lookup failure propagates");

    assert!(matches!(err, Error::Lookup { .. }), "got {err:?}");
    assert!(err.is_retryable());
    let source = err.source().expect("lookup error keeps its cause");
    assert!(source.to_string().contains("EndpointSlice backend unavailable"));
}

#[test]
fn lookup_recovers_once_the_store_does() {
    let (owner, store) = fleet();
    store.fail_queries(Kind::Cluster, 1);

    assert!(reconcile(&owner, &store, &ReconcilerConfig::default()).is_err());
    let effects = reconcile(&owner, &store, &ReconcilerConfig::default())
        .expect("second attempt succeeds");
    assert_eq!(
        persisted_addresses(&effects),
        Some(vec!["x.gateway.c1.ns1.xcc.test.clusters.xcc.test".to_string()])
    );
}

#[test]
fn malformed_selector_fails_before_any_query() {
    let store = ScriptedStore::default();
    let malformed = [
        LabelSelectorRequirement::new("env", LabelSelectorOperator::In, Vec::<String>::new()),
        LabelSelectorRequirement::new("env", LabelSelectorOperator::Exists, ["prod"]),
        LabelSelectorRequirement::new("bad key!", LabelSelectorOperator::Exists, Vec::<String>::new()),
    ];

    for requirement in malformed {
        let owner = DomainOwner::new("ns1", "shop")
            .with_owners(LabelSelector::default().and_expression(requirement.clone()));

        let err = reconcile(&owner, &store, &ReconcilerConfig::default())
            .expect_err("malformed selector is rejected");
        assert!(
            matches!(err, Error::MalformedSelector(_)),
            "{requirement:?} gave {err:?}"
        );
        assert!(!err.is_retryable());
    }

    assert_eq!(store.total_queries(), 0);
}
