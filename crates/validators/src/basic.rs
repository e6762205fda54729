//! Value comparators
//!
//! Equality, ordering, similarity, pattern and length checks. All of them
//! look at one element at a time and stop at the first failure.

use attrflow_core::{Error, ErrorRecord, Result, Value, Verdict};
use attrflow_types::parse_bool;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::comparator::{builtin_regex, first_failure, param, text, CheckContext, Comparator};

static URL_PATTERN: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$"));

static HOST_LABEL_PATTERN: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$"));

static MAIL_PATTERN: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"));

/// Minimum similarity ratio accepted by [`Like`]
pub const LIKE_THRESHOLD: f64 = 0.75;

// =============================================================================
// Equality
// =============================================================================

fn equals(value: &Value, expected: &str, case_sensitive: bool) -> bool {
    let actual = text(value);
    if case_sensitive {
        actual == expected
    } else {
        actual.to_lowercase() == expected.to_lowercase()
    }
}

fn case_flag(params: &[String]) -> bool {
    params.get(1).map_or(true, |flag| parse_bool(flag))
}

/// Every element equals `params[0]`; `params[1] = "false"` ignores case
#[derive(Debug, Clone, Copy, Default)]
pub struct Equals;

impl Comparator for Equals {
    fn name(&self) -> &'static str {
        "Equals"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let expected = param(params, 0, self.name())?;
        let case_sensitive = case_flag(params);
        first_failure(values, |index, value| {
            Ok((!equals(value, expected, case_sensitive)).then(|| {
                ErrorRecord::new(index, "value {value} does not match {expected}")
                    .with("value", text(value))
                    .with("expected", expected)
            }))
        })
    }
}

/// No element equals `params[0]`
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEquals;

impl Comparator for NotEquals {
    fn name(&self) -> &'static str {
        "NotEquals"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let rejected = param(params, 0, self.name())?;
        let case_sensitive = case_flag(params);
        first_failure(values, |index, value| {
            Ok(equals(value, rejected, case_sensitive).then(|| {
                ErrorRecord::new(index, "value {value} is not allowed").with("value", text(value))
            }))
        })
    }
}

// =============================================================================
// Ordering
// =============================================================================

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        other => other.as_text().and_then(|t| t.trim().parse::<f64>().ok()),
    }
}

/// Literal number, or the first value of the attribute named by `raw`
fn operand(ctx: &CheckContext<'_>, raw: &str) -> Result<Option<f64>> {
    if let Ok(literal) = raw.parse::<i64>() {
        return Ok(Some(literal as f64));
    }
    let referenced = ctx.attributes.require(raw)?;
    match referenced.first() {
        None => Ok(None),
        Some(v) => numeric(v)
            .map(Some)
            .ok_or_else(|| Error::conversion("Integer", text(v), format!("attribute '{}' is not numeric", raw))),
    }
}

fn compare<F>(
    ctx: &CheckContext<'_>,
    comparator: &str,
    values: &[Value],
    params: &[String],
    relation: &str,
    holds: F,
) -> Result<Verdict>
where
    F: Fn(f64, f64) -> bool,
{
    let raw = param(params, 0, comparator)?;
    let bound = match operand(ctx, raw)? {
        Some(bound) => bound,
        None => {
            trace!(comparator, operand = raw, "comparison attribute is empty");
            return Ok(Verdict::pass());
        }
    };
    first_failure(values, |index, value| {
        let record = match numeric(value) {
            None => Some(ErrorRecord::new(index, "value {value} is not a number").with("value", text(value))),
            Some(n) if !holds(n, bound) => Some(
                ErrorRecord::new(index, format!("value {{value}} is not {} {{comparison}}", relation))
                    .with("value", text(value))
                    .with("comparison", raw),
            ),
            Some(_) => None,
        };
        Ok(record)
    })
}

/// Every element is numerically greater than the operand
///
/// The operand is `params[0]` when it is an integer, otherwise the first
/// value of the attribute it names.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greater;

impl Comparator for Greater {
    fn name(&self) -> &'static str {
        "Greater"
    }

    fn process(&self, ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        compare(ctx, self.name(), values, params, "greater than", |a, b| a > b)
    }
}

/// Every element is numerically smaller than the operand
#[derive(Debug, Clone, Copy, Default)]
pub struct Smaller;

impl Comparator for Smaller {
    fn name(&self) -> &'static str {
        "Smaller"
    }

    fn process(&self, ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        compare(ctx, self.name(), values, params, "smaller than", |a, b| a < b)
    }
}

// =============================================================================
// Similarity
// =============================================================================

/// Similarity ratio in `[0, 1]` based on recursively matched common blocks
///
/// `2 * matched / (len(a) + len(b))`; two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched(&a, &b) as f64 / total as f64
}

fn matched(a: &[char], b: &[char]) -> usize {
    let (i, j, size) = longest_common_block(a, b);
    if size == 0 {
        return 0;
    }
    size + matched(&a[..i], &b[..j]) + matched(&a[i + size..], &b[j + size..])
}

/// Leftmost longest common run as `(start_a, start_b, len)`
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                row[j + 1] = previous[j] + 1;
                if row[j + 1] > best.2 {
                    best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
                }
            }
        }
        previous = row;
    }
    best
}

/// Every element is at least 75% similar to `params[0]`
#[derive(Debug, Clone, Copy, Default)]
pub struct Like;

impl Comparator for Like {
    fn name(&self) -> &'static str {
        "Like"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let reference = param(params, 0, self.name())?;
        first_failure(values, |index, value| {
            let candidate = text(value);
            Ok((similarity(&candidate, reference) < LIKE_THRESHOLD).then(|| {
                ErrorRecord::new(index, "value {value} is not like {comparison}")
                    .with("value", candidate)
                    .with("comparison", reference)
            }))
        })
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// Every element matches the pattern in `params[0]`, anchored at the start
#[derive(Debug, Clone, Copy, Default)]
pub struct RegEx;

impl Comparator for RegEx {
    fn name(&self) -> &'static str {
        "RegEx"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let pattern = param(params, 0, self.name())?;
        let regex = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|e| Error::schema(format!("invalid pattern {:?} for RegEx: {}", pattern, e)))?;
        first_failure(values, |index, value| {
            let candidate = text(value);
            Ok((!regex.is_match(&candidate)).then(|| {
                ErrorRecord::new(index, "value {value} does not match {pattern}")
                    .with("value", candidate)
                    .with("pattern", pattern)
            }))
        })
    }
}

/// Every element is an `http` or `https` URL
#[derive(Debug, Clone, Copy, Default)]
pub struct IsValidUrl;

impl Comparator for IsValidUrl {
    fn name(&self) -> &'static str {
        "IsValidURL"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], _params: &[String]) -> Result<Verdict> {
        let regex = builtin_regex(&URL_PATTERN)?;
        first_failure(values, |index, value| {
            let candidate = text(value);
            Ok((!regex.is_match(&candidate))
                .then(|| ErrorRecord::new(index, "value {value} is not a valid URL").with("value", candidate)))
        })
    }
}

fn is_host_name(candidate: &str, label: &Regex) -> bool {
    let name = candidate.strip_suffix('.').unwrap_or(candidate);
    !name.is_empty() && name.len() <= 253 && name.split('.').all(|part| label.is_match(part))
}

/// Every element is a syntactically valid DNS host name
#[derive(Debug, Clone, Copy, Default)]
pub struct IsValidHostName;

impl Comparator for IsValidHostName {
    fn name(&self) -> &'static str {
        "IsValidHostName"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], _params: &[String]) -> Result<Verdict> {
        let label = builtin_regex(&HOST_LABEL_PATTERN)?;
        first_failure(values, |index, value| {
            let candidate = text(value);
            Ok((!is_host_name(&candidate, label))
                .then(|| ErrorRecord::new(index, "value {value} is not a valid host name").with("value", candidate)))
        })
    }
}

/// Every element looks like a mail address
#[derive(Debug, Clone, Copy, Default)]
pub struct IsValidMailAddress;

impl Comparator for IsValidMailAddress {
    fn name(&self) -> &'static str {
        "IsValidMailAddress"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], _params: &[String]) -> Result<Verdict> {
        let regex = builtin_regex(&MAIL_PATTERN)?;
        first_failure(values, |index, value| {
            let candidate = text(value);
            Ok((!regex.is_match(&candidate)).then(|| {
                ErrorRecord::new(index, "value {value} is not a valid mail address").with("value", candidate)
            }))
        })
    }
}

// =============================================================================
// Length and uniqueness
// =============================================================================

fn bound(params: &[String], index: usize, comparator: &str) -> Result<i64> {
    let raw = param(params, index, comparator)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::schema(format!("{} bound {:?} is not an integer", comparator, raw)))
}

/// Character count of every element lies in `[params[0], params[1]]`
///
/// A negative maximum means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLength;

impl Comparator for StringLength {
    fn name(&self) -> &'static str {
        "StringLength"
    }

    fn process(&self, _ctx: &CheckContext<'_>, _key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let min = bound(params, 0, self.name())?;
        let max = bound(params, 1, self.name())?;
        first_failure(values, |index, value| {
            let candidate = text(value);
            let length = candidate.chars().count() as i64;
            let record = if length < min {
                Some(
                    ErrorRecord::new(index, "value {value} is shorter than {min} characters")
                        .with("value", &candidate)
                        .with("min", min),
                )
            } else if max >= 0 && length > max {
                Some(
                    ErrorRecord::new(index, "value {value} is longer than {max} characters")
                        .with("value", &candidate)
                        .with("max", max),
                )
            } else {
                None
            };
            Ok(record)
        })
    }
}

/// No other object holds the same value for this attribute
///
/// Values already stored on the object itself pass. `params[0]` optionally
/// restricts the check to one object type.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsUniqueValue;

impl Comparator for IsUniqueValue {
    fn name(&self) -> &'static str {
        "IsUniqueValue"
    }

    fn process(&self, ctx: &CheckContext<'_>, key: &str, values: &[Value], params: &[String]) -> Result<Verdict> {
        let slot = ctx.attributes.require(key)?;
        let backend = ctx.env.first_backend(&slot.backend)?;
        let object_type = params.get(0).map(String::as_str).filter(|t| !t.is_empty());
        first_failure(values, |index, value| {
            if slot.original.contains(value) {
                return Ok(None);
            }
            let unique = backend.is_uniq(key, value, object_type)?;
            Ok((!unique).then(|| ErrorRecord::new(index, "value {value} is already in use").with("value", text(value))))
        })
    }
}
