//! Structured validation results
//!
//! Comparators never raise on ordinary validation failure. They return a
//! [`Verdict`] whose [`ErrorRecord`]s carry a message template and named
//! placeholders, so callers can localize and render messages later without
//! re-deriving context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One validation failure
///
/// `detail` is a template such as `"value {value} is not greater than {comparison}"`;
/// `placeholders` fill the named `{...}` slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Position of the offending element in a multi-valued attribute
    pub index: usize,
    /// Message template with `{name}` placeholders
    pub detail: String,
    /// Named placeholder values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub placeholders: BTreeMap<String, String>,
}

impl ErrorRecord {
    /// Create a record for the element at `index`
    pub fn new(index: usize, detail: impl Into<String>) -> Self {
        ErrorRecord {
            index,
            detail: detail.into(),
            placeholders: BTreeMap::new(),
        }
    }

    /// Add a named placeholder
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.placeholders.insert(name.into(), value.to_string());
        self
    }

    /// Render the template with its placeholders substituted
    pub fn render(&self) -> String {
        let mut out = self.detail.clone();
        for (name, value) in &self.placeholders {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }
}

/// Outcome of a comparator or a validation program
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the values passed
    pub ok: bool,
    /// Error records; empty when `ok`
    pub errors: Vec<ErrorRecord>,
}

impl Verdict {
    /// A passing verdict
    pub fn pass() -> Self {
        Verdict {
            ok: true,
            errors: Vec::new(),
        }
    }

    /// A failing verdict with a single record
    pub fn fail(record: ErrorRecord) -> Self {
        Verdict {
            ok: false,
            errors: vec![record],
        }
    }

    /// A failing verdict with several records
    pub fn fail_all(errors: Vec<ErrorRecord>) -> Self {
        Verdict { ok: false, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let record = ErrorRecord::new(0, "value {value} is not greater than {comparison}")
            .with("value", 1)
            .with("comparison", "3");
        assert_eq!(record.render(), "value 1 is not greater than 3");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let record = ErrorRecord::new(2, "missing {key}");
        assert_eq!(record.render(), "missing {key}");
    }

    #[test]
    fn test_verdict_constructors() {
        assert!(Verdict::pass().ok);
        let v = Verdict::fail(ErrorRecord::new(0, "x"));
        assert!(!v.ok);
        assert_eq!(v.errors.len(), 1);
    }
}
