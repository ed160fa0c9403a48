//! Desired EndpointSlice construction

use crate::model::{AddressType, DomainOwner, Endpoint, EndpointSlice, ObjectMeta};

/// Label put on every EndpointSlice the reconciler creates
pub const SCATTER_LABEL: &str = "fun.xcc/scatter";

/// Build the EndpointSlice a DomainOwner should have
///
/// Addresses are sorted (plain byte order) and deduplicated so the same
/// membership always yields the same value, whatever order the store
/// listed clusters in.
///
/// With an `existing` slice, its metadata (identity, labels, owner
/// references, resource version) is kept and only the address type and
/// endpoints are replaced. Otherwise a new slice is named after the
/// DomainOwner and points back at it through an owner reference, so
/// deleting the DomainOwner garbage-collects the slice.
pub fn build(
    owner: &DomainOwner,
    mut addresses: Vec<String>,
    existing: Option<EndpointSlice>,
) -> EndpointSlice {
    addresses.sort_unstable();
    addresses.dedup();

    let mut slice = existing.unwrap_or_else(|| new_slice(owner));
    slice.address_type = AddressType::FQDN;
    slice.endpoints = vec![Endpoint { addresses }];
    slice
}

fn new_slice(owner: &DomainOwner) -> EndpointSlice {
    let mut metadata = ObjectMeta::new(&owner.metadata.namespace, &owner.metadata.name)
        .with_label(SCATTER_LABEL, "true");
    metadata.owner_references = vec![owner.owner_reference()];

    EndpointSlice {
        metadata,
        address_type: AddressType::FQDN,
        endpoints: Vec::new(),
    }
}
