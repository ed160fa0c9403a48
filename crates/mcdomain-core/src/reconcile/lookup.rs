//! The two reads a reconciliation makes
//!
//! Both go through the query capability exactly once and wrap any failure
//! in [`Error::Lookup`], keeping the store error as its source.

use crate::error::{Error, Result};
use crate::model::{Cluster, DomainOwner, EndpointSlice, Kind, Object, Resource};
use crate::selector::Matcher;
use crate::traits::{ObjectQuery, Query, QueryResult};

/// Clusters in `namespace` accepted by `matcher`
pub fn member_clusters<Q>(query: &Q, namespace: &str, matcher: &Matcher) -> Result<Vec<Cluster>>
where
    Q: ObjectQuery + ?Sized,
{
    let request = Query::list(Kind::Cluster, namespace).with_selector(matcher.clone());

    let objects = match run(query, &request)? {
        QueryResult::Many(objects) => objects,
        QueryResult::One(object) => vec![object],
        QueryResult::NotFound => Vec::new(),
    };

    objects
        .into_iter()
        .map(|object| expect_kind::<Cluster>(&request, object))
        .collect()
}

/// The EndpointSlice previously written for `owner`, if any
pub fn existing_slice<Q>(query: &Q, owner: &DomainOwner) -> Result<Option<EndpointSlice>>
where
    Q: ObjectQuery + ?Sized,
{
    let request = Query::get(
        Kind::EndpointSlice,
        &owner.metadata.namespace,
        &owner.metadata.name,
    );

    match run(query, &request)? {
        QueryResult::One(object) => expect_kind::<EndpointSlice>(&request, object).map(Some),
        QueryResult::NotFound => Ok(None),
        QueryResult::Many(objects) => match <[Object; 1]>::try_from(objects) {
            Ok([object]) => expect_kind::<EndpointSlice>(&request, object).map(Some),
            Err(objects) if objects.is_empty() => Ok(None),
            Err(objects) => Err(Error::lookup(
                request.to_string(),
                Error::store(format!(
                    "expected at most one object, got {}",
                    objects.len()
                )),
            )),
        },
    }
}

fn run<Q>(query: &Q, request: &Query) -> Result<QueryResult>
where
    Q: ObjectQuery + ?Sized,
{
    query
        .query(request)
        .map_err(|e| Error::lookup(request.to_string(), e))
}

fn expect_kind<R: Resource>(request: &Query, object: Object) -> Result<R> {
    R::try_from(object).map_err(|other| {
        Error::lookup(
            request.to_string(),
            Error::store(format!("expected {}, got {}", R::KIND, other.kind())),
        )
    })
}
