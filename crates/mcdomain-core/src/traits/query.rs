// # Query Capability
//
// Read-only access to objects, as handed to the reconciler.
//
// ## Usage
//
// ```rust,ignore
// use mcdomain_core::traits::{ObjectQuery, Query, QueryResult};
// use mcdomain_core::model::Kind;
//
// fn count_clusters(store: &dyn ObjectQuery) -> mcdomain_core::Result<usize> {
//     match store.query(&Query::list(Kind::Cluster, "ns1"))? {
//         QueryResult::Many(clusters) => Ok(clusters.len()),
//         _ => Ok(0),
//     }
// }
// ```

use std::fmt;
use std::sync::Arc;

use crate::model::{Kind, Object};
use crate::selector::Matcher;

/// A request for objects of one kind in one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Kind of object wanted
    pub kind: Kind,
    /// Namespace to look in
    pub namespace: String,
    /// Exact name, for single-object lookups
    pub name: Option<String>,
    /// Label filter, for collection lookups
    pub selector: Option<Matcher>,
}

impl Query {
    /// All objects of `kind` in `namespace`
    pub fn list(kind: Kind, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: None,
            selector: None,
        }
    }

    /// The object of `kind` named `name` in `namespace`
    pub fn get(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: Some(name.into()),
            selector: None,
        }
    }

    /// Restrict results to objects whose labels match
    pub fn with_selector(mut self, selector: Matcher) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Whether `object` satisfies this query
    ///
    /// Provided for store implementations so they all filter the same way.
    pub fn matches(&self, object: &Object) -> bool {
        let meta = object.meta();
        object.kind() == self.kind
            && meta.namespace == self.namespace
            && self.name.as_deref().is_none_or(|name| meta.name == name)
            && self
                .selector
                .as_ref()
                .is_none_or(|selector| selector.matches(&meta.labels))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {}/{}", self.kind, self.namespace, name)?,
            None => write!(f, "{} in {}", self.kind, self.namespace)?,
        }
        if let Some(selector) = &self.selector {
            write!(f, " matching {}", selector)?;
        }
        Ok(())
    }
}

/// Answer to a [`Query`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// The single named object
    One(Object),
    /// Every object matching a collection query (possibly empty)
    Many(Vec<Object>),
    /// The named object does not exist
    NotFound,
}

/// Synchronous, read-only query capability
///
/// Named lookups (`Query::name` set) answer [`QueryResult::One`] or
/// [`QueryResult::NotFound`]; collection lookups answer
/// [`QueryResult::Many`]. Absence is never an error. Errors are reserved
/// for transport/storage failures and are propagated untouched by the
/// reconciler.
pub trait ObjectQuery: Send + Sync {
    /// Run a query
    ///
    /// # Returns
    ///
    /// - `Ok(QueryResult)`: The matching object(s), or `NotFound`
    /// - `Err(Error)`: Storage error
    fn query(&self, query: &Query) -> Result<QueryResult, crate::Error>;
}

impl<T: ObjectQuery + ?Sized> ObjectQuery for Arc<T> {
    fn query(&self, query: &Query) -> Result<QueryResult, crate::Error> {
        (**self).query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cluster, LabelSelector};
    use crate::selector;

    #[test]
    fn test_query_matches_kind_namespace_name() {
        let object = Object::from(Cluster::new("ns1", "c1"));

        assert!(Query::list(Kind::Cluster, "ns1").matches(&object));
        assert!(Query::get(Kind::Cluster, "ns1", "c1").matches(&object));
        assert!(!Query::get(Kind::Cluster, "ns1", "c2").matches(&object));
        assert!(!Query::list(Kind::Cluster, "ns2").matches(&object));
        assert!(!Query::list(Kind::DomainOwner, "ns1").matches(&object));
    }

    #[test]
    fn test_query_matches_selector() {
        let prod = Object::from(Cluster::new("ns1", "c1").with_label("env", "prod"));
        let dev = Object::from(Cluster::new("ns1", "c2").with_label("env", "dev"));
        let matcher = selector::resolve(Some(&LabelSelector::with_label("env", "prod"))).unwrap();
        let query = Query::list(Kind::Cluster, "ns1").with_selector(matcher);

        assert!(query.matches(&prod));
        assert!(!query.matches(&dev));
    }

    #[test]
    fn test_query_display() {
        let matcher = selector::resolve(Some(&LabelSelector::with_label("env", "prod"))).unwrap();
        assert_eq!(
            Query::list(Kind::Cluster, "ns1")
                .with_selector(matcher)
                .to_string(),
            "Cluster in ns1 matching env=prod"
        );
        assert_eq!(
            Query::get(Kind::EndpointSlice, "ns1", "shop").to_string(),
            "EndpointSlice ns1/shop"
        );
    }
}
