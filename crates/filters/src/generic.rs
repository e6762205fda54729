//! General-purpose filters: key switching, value setting, type changes

use attrflow_core::{Result, Value, ValueTable};
use attrflow_types::parse_bool;
use tracing::debug;

use crate::filter::{map_values, opt_param, param, text, Filter, FilterContext};

/// Continue the program on attribute `params[0]`
///
/// The current values of `key` are copied onto the target slot, which is
/// created with the same type if it does not exist yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Target;

impl Filter for Target {
    fn name(&self) -> &'static str {
        "Target"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let target = param(params, 0, self.name())?;
        if target != key {
            let source = table.require(key)?.clone();
            let slot = table.entry(target, &source.value_type);
            slot.current = source.current;
            slot.backend_type = source.backend_type;
        }
        Ok(target.to_string())
    }
}

/// Replace the values with the single text `params[0]`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetValue;

impl Filter for SetValue {
    fn name(&self) -> &'static str {
        "SetValue"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let value = param(params, 0, self.name())?;
        table.set_values(key, vec![Value::from(value)])?;
        Ok(key.to_string())
    }
}

/// Drop every value
#[derive(Debug, Clone, Copy, Default)]
pub struct Clear;

impl Filter for Clear {
    fn name(&self) -> &'static str {
        "Clear"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        table.set_values(key, Vec::new())?;
        Ok(key.to_string())
    }
}

/// Replace the eligible backends with `params`
#[derive(Debug, Clone, Copy, Default)]
pub struct SetBackends;

impl Filter for SetBackends {
    fn name(&self) -> &'static str {
        "SetBackends"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        param(params, 0, self.name())?;
        let slot = table.require_mut(key)?;
        slot.backend.clear();
        for backend in params {
            slot.add_backend(backend.as_str());
        }
        Ok(key.to_string())
    }
}

/// Convert the values from their backend type into type `params[0]`
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertType;

impl Filter for ConvertType {
    fn name(&self) -> &'static str {
        "ConvertType"
    }

    fn process(&self, ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let target = param(params, 0, self.name())?;
        let slot = table.require_mut(key)?;
        let converted = ctx
            .types
            .convert(&slot.backend_type, target, &slot.current, key)?;
        debug!(attribute = key, from = %slot.backend_type, to = target, "converted values");
        slot.current = converted;
        slot.backend_type = target.to_string();
        Ok(key.to_string())
    }
}

/// Text to boolean
///
/// With `params[0]` only that exact text is true; otherwise `""`, `"0"`,
/// `"false"` and `"False"` are false and everything else is true.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToBoolean;

impl Filter for StringToBoolean {
    fn name(&self) -> &'static str {
        "StringToBoolean"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let truthy = opt_param(params, 0);
        map_values(table, key, |value| {
            if let Value::Bool(b) = value {
                return Ok(Value::Bool(*b));
            }
            let text = text(self.name(), value)?;
            Ok(Value::Bool(match truthy {
                Some(t) => text == t,
                None => parse_bool(&text),
            }))
        })?;
        table.require_mut(key)?.backend_type = "Boolean".to_string();
        Ok(key.to_string())
    }
}

/// Boolean to text, `"true"`/`"false"` unless `params` name other words
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanToString;

impl Filter for BooleanToString {
    fn name(&self) -> &'static str {
        "BooleanToString"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let on = opt_param(params, 0).unwrap_or("true");
        let off = opt_param(params, 1).unwrap_or("false");
        map_values(table, key, |value| {
            Ok(Value::from(if value.is_truthy() { on } else { off }))
        })?;
        table.require_mut(key)?.backend_type = "UnicodeString".to_string();
        Ok(key.to_string())
    }
}

/// Allocate the next free number for an empty id attribute
///
/// The counter is kept by the first eligible backend of the attribute;
/// `params[0]` optionally names a different counter attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateIds;

impl Filter for GenerateIds {
    fn name(&self) -> &'static str {
        "GenerateIds"
    }

    fn process(&self, ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let slot = table.require_mut(key)?;
        if !slot.is_empty() {
            return Ok(key.to_string());
        }
        let counter = opt_param(params, 0).unwrap_or(key);
        let id = ctx.env.first_backend(&slot.backend)?.get_next_id(counter)?;
        debug!(attribute = key, id, "allocated id");
        slot.current = vec![Value::Int(id)];
        Ok(key.to_string())
    }
}
