//! Filter contract, context and registry

use std::collections::BTreeMap;
use std::sync::Arc;

use attrflow_core::{Collaborators, Error, ObjectRef, Query, Record, Result, Value, ValueTable};
use attrflow_types::{text_of, TypeRegistry};
use serde::{Deserialize, Serialize};

use crate::artifact::StoreArtifact;
use crate::flags::{
    MarshalFlags, MarshalMailDeliveryMode, MarshalSambaAcctFlags, UnmarshalFlags,
    UnmarshalMailDeliveryMode, UnmarshalSambaAcctFlags,
};
use crate::foreman::{ForemanHostGroupIn, ForemanHostGroupOut, ForemanStatusIn, ForemanStatusOut};
use crate::generic::{
    BooleanToString, Clear, ConvertType, GenerateIds, SetBackends, SetValue, StringToBoolean,
    Target,
};
use crate::json::{JsonToString, StringToJson};
use crate::samba::{DetectSambaDomainFromSid, GenerateSambaSid};
use crate::strings::{ConcatString, JoinArray, Replace, SplitString};
use crate::temporal::{
    DateToString, DatetimeToInteger, DatetimeToString, IntegerToDatetime, StringToDate,
    StringToDatetime,
};

/// Deployment-specific knobs some filters consult
///
/// Loaded from the `[filters]` table of the engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Object type holding samba domain definitions
    pub samba_domain_type: String,
    /// RID base used when a domain does not define `sambaAlgorithmicRidBase`
    pub samba_rid_base: i64,
    /// Domain used when an object carries no `sambaDomainName`
    pub default_samba_domain: Option<String>,
    /// Object type holding foreman host groups
    pub foreman_host_group_type: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            samba_domain_type: "SambaDomain".to_string(),
            samba_rid_base: 1000,
            default_samba_domain: None,
            foreman_host_group_type: "ForemanHostGroup".to_string(),
        }
    }
}

/// Everything a filter may consult besides the value table
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    /// Object the program runs for
    pub object: &'a ObjectRef,
    /// External collaborators
    pub env: &'a Collaborators,
    /// Type registry for conversions
    pub types: &'a TypeRegistry,
    /// Deployment settings
    pub settings: &'a FilterSettings,
}

impl<'a> FilterContext<'a> {
    /// Bundle the views
    pub fn new(
        object: &'a ObjectRef,
        env: &'a Collaborators,
        types: &'a TypeRegistry,
        settings: &'a FilterSettings,
    ) -> Self {
        FilterContext {
            object,
            env,
            types,
            settings,
        }
    }
}

/// A named value transformer
///
/// A filter mutates the value table in place and returns the key the rest
/// of the program should work on, which is usually `key` itself.
pub trait Filter: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Transform the table
    ///
    /// # Errors
    ///
    /// Any error aborts the program of the attribute being processed.
    fn process(&self, ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String>;
}

/// Named registry of filters
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<dyn Filter>>,
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FilterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in filter
    pub fn with_builtins() -> Self {
        let builtins: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Target),
            Arc::new(SetValue),
            Arc::new(Clear),
            Arc::new(SetBackends),
            Arc::new(ConvertType),
            Arc::new(StringToBoolean),
            Arc::new(BooleanToString),
            Arc::new(GenerateIds),
            Arc::new(SplitString),
            Arc::new(JoinArray),
            Arc::new(ConcatString),
            Arc::new(Replace),
            Arc::new(StringToDatetime),
            Arc::new(DatetimeToString),
            Arc::new(StringToDate),
            Arc::new(DateToString),
            Arc::new(IntegerToDatetime),
            Arc::new(DatetimeToInteger),
            Arc::new(MarshalFlags),
            Arc::new(UnmarshalFlags),
            Arc::new(MarshalMailDeliveryMode),
            Arc::new(UnmarshalMailDeliveryMode),
            Arc::new(MarshalSambaAcctFlags),
            Arc::new(UnmarshalSambaAcctFlags),
            Arc::new(GenerateSambaSid),
            Arc::new(DetectSambaDomainFromSid),
            Arc::new(ForemanStatusIn),
            Arc::new(ForemanStatusOut),
            Arc::new(ForemanHostGroupIn),
            Arc::new(ForemanHostGroupOut),
            Arc::new(StringToJson),
            Arc::new(JsonToString),
            Arc::new(StoreArtifact),
        ];
        let mut registry = Self::new();
        for filter in builtins {
            registry.register(filter);
        }
        registry
    }

    /// Add or replace a filter
    pub fn register(&mut self, filter: Arc<dyn Filter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    /// Look up a filter
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.get(name)
    }

    /// Look up a filter that must exist
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for unknown names.
    pub fn require(&self, name: &str) -> Result<&Arc<dyn Filter>> {
        self.get(name)
            .ok_or_else(|| Error::schema(format!("unknown filter '{}'", name)))
    }

    /// Registered names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

// =============================================================================
// Helpers shared by the filter families
// =============================================================================

/// Required positional parameter
pub(crate) fn param<'p>(params: &'p [String], index: usize, filter: &str) -> Result<&'p str> {
    params.get(index).map(String::as_str).ok_or_else(|| {
        Error::schema(format!("filter {} expects parameter #{}", filter, index + 1))
    })
}

/// Optional positional parameter; empty strings count as absent
pub(crate) fn opt_param(params: &[String], index: usize) -> Option<&str> {
    params.get(index).map(String::as_str).filter(|p| !p.is_empty())
}

/// Text of a scalar element
pub(crate) fn text(filter: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(_) | Value::Bytes(_) => text_of(filter, value),
        other => other.as_text().ok_or_else(|| {
            Error::conversion(filter, other.to_string(), "expected a scalar value")
        }),
    }
}

/// Apply `convert` to every current value of `key`
pub(crate) fn map_values<F>(table: &mut ValueTable, key: &str, mut convert: F) -> Result<()>
where
    F: FnMut(&Value) -> Result<Value>,
{
    let slot = table.require_mut(key)?;
    let converted = slot
        .current
        .iter()
        .map(&mut convert)
        .collect::<Result<Vec<_>>>()?;
    slot.current = converted;
    Ok(())
}

/// Exactly one search hit for `query`
///
/// # Errors
///
/// [`Error::RelationNotFound`] without hits and [`Error::RelationAmbiguity`]
/// with several, both naming `attribute` and the looked-up `value`.
pub(crate) fn find_one(
    ctx: &FilterContext<'_>,
    query: &Query,
    projection: &[&str],
    attribute: &str,
    value: &str,
) -> Result<Record> {
    let mut hits = ctx.env.search.search(query, projection)?;
    match hits.len() {
        1 => Ok(hits.remove(0)),
        0 => Err(Error::RelationNotFound {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }),
        matches => Err(Error::RelationAmbiguity {
            attribute: attribute.to_string(),
            value: value.to_string(),
            matches,
        }),
    }
}

/// First value of `attribute` in a search hit, as text
pub(crate) fn first_text(record: &Record, attribute: &str) -> Option<String> {
    record
        .get(attribute)
        .and_then(|values| values.first())
        .and_then(Value::as_text)
}

/// Comma-separated parameter list, trimmed, empties dropped
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
