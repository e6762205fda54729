//! Comparators that look up other objects
//!
//! Each element names another object (by DN or by an attribute value) that
//! must exist. A DN currently being renamed or moved passes without a
//! lookup, since the search index may not reflect the new location yet.

use attrflow_core::search::{DN, EXTENSIONS, TYPE, UUID};
use attrflow_core::{ErrorRecord, Query, Result, Value, Verdict};
use tracing::trace;

use crate::comparator::{first_failure, param, text, CheckContext, Comparator};

/// Wildcard object type
pub const ANY_TYPE: &str = "*";

/// Restrict a query to objects whose type or extensions include `object_type`
pub fn of_type(query: Query, object_type: &str) -> Query {
    if object_type == ANY_TYPE {
        return query;
    }
    query.or(
        Query::new().eq(TYPE, object_type),
        Query::new().eq(EXTENSIONS, object_type),
    )
}

fn exists(ctx: &CheckContext<'_>, query: &Query) -> Result<bool> {
    Ok(!ctx.env.search.search(query, &[UUID])?.is_empty())
}

fn is_moving(ctx: &CheckContext<'_>, candidate: &str) -> bool {
    let moving = ctx.env.moves.is_moving(candidate);
    if moving {
        trace!(dn = candidate, "object is being relocated, skipping lookup");
    }
    moving
}

/// Every element is the DN of an existing object
#[derive(Debug, Clone, Copy, Default)]
pub struct IsExistingDn;

impl Comparator for IsExistingDn {
    fn name(&self) -> &'static str {
        "IsExistingDN"
    }

    fn process(&self, ctx: &CheckContext<'_>, _key: &str, values: &[Value], _params: &[String]) -> Result<Verdict> {
        first_failure(values, |index, value| {
            let dn = text(value);
            if is_moving(ctx, &dn) || exists(ctx, &Query::new().eq(DN, dn.as_str()))? {
                return Ok(None);
            }
            Ok(Some(ErrorRecord::new(index, "no object with DN {dn} exists").with("dn", dn)))
        })
    }
}

/// Every element is the DN of an existing object of type `params[0]`
#[derive(Debug, Clone, Copy, Default)]
pub struct IsExistingDnOfType;

impl Comparator for IsExistingDnOfType {
    fn name(&self) -> &'static str {
        "IsExistingDnOfType"
    }

    fn process(&self, ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let object_type = param(params, 0, self.name())?;
        first_failure(values, |index, value| {
            let dn = text(value);
            let query = of_type(Query::new().eq(DN, dn.as_str()), object_type);
            if is_moving(ctx, &dn) || exists(ctx, &query)? {
                return Ok(None);
            }
            Ok(Some(
                ErrorRecord::new(index, "no {type} with DN {dn} exists")
                    .with("dn", dn)
                    .with("type", object_type),
            ))
        })
    }
}

/// Some object of type `params[0]` has attribute `params[1]` equal to each element
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectWithPropertyExists;

impl Comparator for ObjectWithPropertyExists {
    fn name(&self) -> &'static str {
        "ObjectWithPropertyExists"
    }

    fn process(&self, ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let object_type = param(params, 0, self.name())?;
        let attribute = param(params, 1, self.name())?;
        first_failure(values, |index, value| {
            let candidate = text(value);
            let query = of_type(Query::new().eq(attribute, value.clone()), object_type);
            if is_moving(ctx, &candidate) || exists(ctx, &query)? {
                return Ok(None);
            }
            Ok(Some(
                ErrorRecord::new(index, "no {type} with {attribute} {value} exists")
                    .with("type", object_type)
                    .with("attribute", attribute)
                    .with("value", candidate),
            ))
        })
    }
}
