//! Gateway address derivation

use crate::model::Cluster;

/// Suffix used when none is configured
pub const DEFAULT_SUFFIX: &str = "xcc.test";

/// FQDN of a cluster's ingress gateway
///
/// `x.gateway.<cluster-name>.<cluster-namespace>.<suffix>.clusters.<suffix>`
pub fn gateway_address(cluster: &Cluster, suffix: &str) -> String {
    format!(
        "x.gateway.{}.{}.{suffix}.clusters.{suffix}",
        cluster.metadata.name, cluster.metadata.namespace
    )
}
