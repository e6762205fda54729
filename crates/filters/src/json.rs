//! JSON passthrough filters

use attrflow_core::{Error, Result, Value, ValueTable};

use crate::filter::{map_values, text, Filter, FilterContext};

/// Decode every value as strict JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct StringToJson;

impl Filter for StringToJson {
    fn name(&self) -> &'static str {
        "StringToJson"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        map_values(table, key, |value| {
            let raw = text(self.name(), value)?;
            serde_json::from_str::<serde_json::Value>(&raw)
                .map(Value::from)
                .map_err(|e| Error::conversion("Json", raw, e.to_string()))
        })?;
        Ok(key.to_string())
    }
}

/// Encode every value as compact JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonToString;

impl Filter for JsonToString {
    fn name(&self) -> &'static str {
        "JsonToString"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, _params: &[String]) -> Result<String> {
        map_values(table, key, |value| {
            let json: serde_json::Value = value.clone().into();
            Ok(Value::from(serde_json::to_string(&json)?))
        })?;
        Ok(key.to_string())
    }
}
