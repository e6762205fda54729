//! Foreman integration filters

use attrflow_core::search::TYPE;
use attrflow_core::{Error, Query, Result, Value, ValueTable};
use attrflow_types::parse_int;

use crate::filter::{find_one, first_text, map_values, opt_param, text, Filter, FilterContext};

/// Host status codes as reported by Foreman, indexed by code
pub const STATUS_NAMES: [&str; 3] = ["ok", "warning", "error"];

const UNKNOWN_STATUS: &str = "unknown";
const GROUP_ID: &str = "foremanGroupId";
const GROUP_NAME: &str = "name";

fn status_code(filter: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => parse_int(text(filter, other)?.trim()),
    }
}

/// Numeric status code to its name (`0 ok`, `1 warning`, `2 error`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ForemanStatusIn;

impl Filter for ForemanStatusIn {
    fn name(&self) -> &'static str {
        "ForemanStatusIn"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        map_values(table, key, |value| {
            let code = status_code(self.name(), value)?;
            let name = usize::try_from(code)
                .ok()
                .and_then(|i| STATUS_NAMES.get(i))
                .copied()
                .unwrap_or(UNKNOWN_STATUS);
            Ok(Value::from(name))
        })?;
        Ok(key.to_string())
    }
}

/// Status name back to its numeric code
#[derive(Debug, Clone, Copy, Default)]
pub struct ForemanStatusOut;

impl Filter for ForemanStatusOut {
    fn name(&self) -> &'static str {
        "ForemanStatusOut"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        map_values(table, key, |value| {
            let name = text(self.name(), value)?;
            STATUS_NAMES
                .iter()
                .position(|s| *s == name)
                .map(|code| Value::Int(code as i64))
                .ok_or_else(|| Error::conversion("ForemanStatus", name, "unknown status name"))
        })?;
        table.require_mut(key)?.backend_type = "Integer".to_string();
        Ok(key.to_string())
    }
}

fn group_attributes(params: &[String]) -> (&str, &str) {
    (
        opt_param(params, 0).unwrap_or(GROUP_ID),
        opt_param(params, 1).unwrap_or(GROUP_NAME),
    )
}

/// Host group id to host group name
///
/// `params`: id attribute (default `foremanGroupId`), name attribute
/// (default `name`) on the host group objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForemanHostGroupIn;

impl Filter for ForemanHostGroupIn {
    fn name(&self) -> &'static str {
        "ForemanHostGroupIn"
    }

    fn process(&self, ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let (id_attribute, name_attribute) = group_attributes(params);
        map_values(table, key, |value| {
            let id = text(self.name(), value)?;
            let query = Query::new()
                .eq(TYPE, ctx.settings.foreman_host_group_type.as_str())
                .eq(id_attribute, id.as_str());
            let record = find_one(ctx, &query, &[name_attribute], key, &id)?;
            first_text(&record, name_attribute)
                .map(Value::from)
                .ok_or_else(|| Error::RelationNotFound {
                    attribute: key.to_string(),
                    value: id,
                })
        })?;
        Ok(key.to_string())
    }
}

/// Host group name back to its id
#[derive(Debug, Clone, Copy, Default)]
pub struct ForemanHostGroupOut;

impl Filter for ForemanHostGroupOut {
    fn name(&self) -> &'static str {
        "ForemanHostGroupOut"
    }

    fn process(&self, ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let (id_attribute, name_attribute) = group_attributes(params);
        map_values(table, key, |value| {
            let name = text(self.name(), value)?;
            let query = Query::new()
                .eq(TYPE, ctx.settings.foreman_host_group_type.as_str())
                .eq(name_attribute, name.as_str());
            let record = find_one(ctx, &query, &[id_attribute], key, &name)?;
            match record.get(id_attribute).and_then(|v| v.first()) {
                Some(Value::Int(i)) => Ok(Value::Int(*i)),
                Some(other) => Ok(Value::from(text(self.name(), other)?)),
                None => Err(Error::RelationNotFound {
                    attribute: key.to_string(),
                    value: name,
                }),
            }
        })?;
        Ok(key.to_string())
    }
}
