//! Search query model
//!
//! Queries are attribute equality maps. [`Match::Any`] is the wildcard
//! sentinel ("attribute present with any value") and [`Query::or`] adds an
//! alternation across sub-queries. Results are ordered lists of projected
//! records.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity key: object uuid
pub const UUID: &str = "_uuid";
/// Identity key: object type name
pub const TYPE: &str = "_type";
/// Identity key: extension type names attached to the object
pub const EXTENSIONS: &str = "_extensions";
/// Identity key: distinguished name
pub const DN: &str = "dn";

/// One projected search result: attribute -> values
pub type Record = BTreeMap<String, Vec<Value>>;

/// Match condition for one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Match {
    /// Attribute has this value among its values
    Value(Value),
    /// Attribute is present with any value
    Any,
}

/// Attribute equality query with optional alternation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Query {
    /// All terms must match
    pub terms: BTreeMap<String, Match>,
    /// When non-empty, at least one alternative must match as well
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<Query>,
}

impl Query {
    /// Empty query (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: attribute equals value
    pub fn eq(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms
            .insert(attribute.into(), Match::Value(value.into()));
        self
    }

    /// Builder: attribute is present
    pub fn present(mut self, attribute: impl Into<String>) -> Self {
        self.terms.insert(attribute.into(), Match::Any);
        self
    }

    /// Builder: add an alternation between two sub-queries
    pub fn or(mut self, left: Query, right: Query) -> Self {
        self.or = vec![left, right];
        self
    }

    /// Evaluate against a full record
    ///
    /// Values compare by textual form when variants differ, so a query for
    /// `"1000"` matches a stored `Int(1000)`.
    pub fn matches(&self, record: &Record) -> bool {
        let terms_match = self.terms.iter().all(|(attr, m)| {
            let values = match record.get(attr) {
                Some(v) if !v.is_empty() => v,
                _ => return false,
            };
            match m {
                Match::Any => true,
                Match::Value(expected) => values.iter().any(|v| loosely_equal(v, expected)),
            }
        });
        terms_match && (self.or.is_empty() || self.or.iter().any(|q| q.matches(record)))
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.as_text(), b.as_text()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Project a record onto the requested attributes
///
/// An empty projection returns the whole record.
pub fn project(record: &Record, projection: &[&str]) -> Record {
    if projection.is_empty() {
        return record.clone();
    }
    projection
        .iter()
        .filter_map(|attr| record.get(*attr).map(|v| (attr.to_string(), v.clone())))
        .collect()
}
