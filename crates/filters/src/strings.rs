//! String shaping filters

use attrflow_core::{Error, Result, Value, ValueTable};
use regex::Regex;

use crate::filter::{map_values, opt_param, param, text, Filter, FilterContext};

/// Split every value on `params[0]` (default `,`), dropping empty fragments
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitString;

impl Filter for SplitString {
    fn name(&self) -> &'static str {
        "SplitString"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let separator = opt_param(params, 0).unwrap_or(",");
        let slot = table.require_mut(key)?;
        let mut parts = Vec::new();
        for value in &slot.current {
            let whole = text(self.name(), value)?;
            parts.extend(
                whole
                    .split(separator)
                    .filter(|part| !part.is_empty())
                    .map(Value::from),
            );
        }
        slot.current = parts;
        Ok(key.to_string())
    }
}

/// Join all values into one with `params[0]` (default `,`)
///
/// An attribute without values stays without values.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinArray;

impl Filter for JoinArray {
    fn name(&self) -> &'static str {
        "JoinArray"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let separator = opt_param(params, 0).unwrap_or(",");
        let slot = table.require_mut(key)?;
        if slot.current.is_empty() {
            return Ok(key.to_string());
        }
        let parts = slot
            .current
            .iter()
            .map(|v| text(self.name(), v))
            .collect::<Result<Vec<_>>>()?;
        slot.current = vec![Value::from(parts.join(separator))];
        Ok(key.to_string())
    }
}

/// Add `params[0]` to every value; `params[1]` is `left` or `right` (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatString;

impl Filter for ConcatString {
    fn name(&self) -> &'static str {
        "ConcatString"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let affix = param(params, 0, self.name())?;
        let prepend = match opt_param(params, 1).unwrap_or("right") {
            "left" => true,
            "right" => false,
            other => {
                return Err(Error::schema(format!(
                    "ConcatString position must be left or right, got {:?}",
                    other
                )))
            }
        };
        map_values(table, key, |value| {
            let base = text(self.name(), value)?;
            Ok(Value::from(if prepend {
                format!("{}{}", affix, base)
            } else {
                format!("{}{}", base, affix)
            }))
        })?;
        Ok(key.to_string())
    }
}

/// Regex replacement of `params[0]` by `params[1]` in every value
///
/// Captures are referenced as `\1` or `$1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Replace;

/// Rewrite `\N` capture references into the `${N}` form
fn replacement_template(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            out.push(c);
        } else {
            out.push_str(&format!("${{{}}}", digits));
        }
    }
    out
}

impl Filter for Replace {
    fn name(&self) -> &'static str {
        "Replace"
    }

    fn process(&self, _ctx: &FilterContext<'_>, key: &str, table: &mut ValueTable, params: &[String]) -> Result<String> {
        let pattern = param(params, 0, self.name())?;
        let replacement = replacement_template(param(params, 1, self.name())?);
        let regex = Regex::new(pattern)
            .map_err(|e| Error::schema(format!("invalid pattern {:?} for Replace: {}", pattern, e)))?;
        map_values(table, key, |value| {
            let original = text(self.name(), value)?;
            Ok(Value::from(regex.replace_all(&original, replacement.as_str()).into_owned()))
        })?;
        Ok(key.to_string())
    }
}
