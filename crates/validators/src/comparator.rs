//! Comparator contract and registry
//!
//! A comparator receives the values under test, the attribute they belong
//! to, string parameters from the rule definition and a read-only view of
//! the owning object. Comparators are stateless and shared across threads.

use std::collections::BTreeMap;
use std::sync::Arc;

use attrflow_core::{Collaborators, Error, ObjectRef, Result, Value, ValueTable, Verdict};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::acl::{IsAclRole, IsAclSet};
use crate::basic::{
    Equals, Greater, IsUniqueValue, IsValidHostName, IsValidMailAddress, IsValidUrl, Like,
    NotEquals, RegEx, Smaller, StringLength,
};
use crate::existence::{IsExistingDn, IsExistingDnOfType, ObjectWithPropertyExists};

/// Read-only view handed to every comparator call
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    /// Object the values belong to
    pub object: &'a ObjectRef,
    /// Snapshot of the object's attributes
    pub attributes: &'a ValueTable,
    /// External lookups
    pub env: &'a Collaborators,
}

impl<'a> CheckContext<'a> {
    /// Bundle the three views
    pub fn new(object: &'a ObjectRef, attributes: &'a ValueTable, env: &'a Collaborators) -> Self {
        CheckContext {
            object,
            attributes,
            env,
        }
    }
}

/// A named validator
pub trait Comparator: Send + Sync {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Check `values` of attribute `key`
    ///
    /// Stops at the first failing element.
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] when the parameters are missing or
    /// malformed. Failing values are reported through the verdict.
    fn process(&self, ctx: &CheckContext<'_>, key: &str, values: &[Value], params: &[String]) -> Result<Verdict>;
}

/// Named registry of comparators
#[derive(Clone, Default)]
pub struct ComparatorRegistry {
    comparators: BTreeMap<String, Arc<dyn Comparator>>,
}

impl std::fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparatorRegistry")
            .field("comparators", &self.comparators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ComparatorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in comparator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: Vec<Arc<dyn Comparator>> = vec![
            Arc::new(Equals),
            Arc::new(NotEquals),
            Arc::new(Greater),
            Arc::new(Smaller),
            Arc::new(Like),
            Arc::new(RegEx),
            Arc::new(StringLength),
            Arc::new(IsValidUrl),
            Arc::new(IsValidHostName),
            Arc::new(IsValidMailAddress),
            Arc::new(IsUniqueValue),
            Arc::new(IsExistingDn),
            Arc::new(IsExistingDnOfType),
            Arc::new(ObjectWithPropertyExists),
            Arc::new(IsAclSet),
            Arc::new(IsAclRole),
        ];
        for comparator in builtins {
            registry.register(comparator);
        }
        registry
    }

    /// Add or replace a comparator
    pub fn register(&mut self, comparator: Arc<dyn Comparator>) {
        self.comparators
            .insert(comparator.name().to_string(), comparator);
    }

    /// Look up a comparator
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Comparator>> {
        self.comparators.get(name)
    }

    /// Look up a comparator that must exist
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for unknown names.
    pub fn require(&self, name: &str) -> Result<&Arc<dyn Comparator>> {
        self.get(name)
            .ok_or_else(|| Error::schema(format!("unknown comparator '{}'", name)))
    }

    /// Registered names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.comparators.keys().map(String::as_str)
    }
}

// =============================================================================
// Helpers shared by the comparator families
// =============================================================================

/// Required positional parameter
pub(crate) fn param<'p>(params: &'p [String], index: usize, comparator: &str) -> Result<&'p str> {
    params.get(index).map(String::as_str).ok_or_else(|| {
        Error::schema(format!(
            "comparator {} expects parameter #{}",
            comparator,
            index + 1
        ))
    })
}

/// Text form of a value; structured values render as JSON
pub(crate) fn text(value: &Value) -> String {
    value.as_text().unwrap_or_else(|| value.to_string())
}

/// Resolve a lazily compiled built-in pattern
pub(crate) fn builtin_regex(cell: &'static Lazy<std::result::Result<Regex, regex::Error>>) -> Result<&'static Regex> {
    cell.as_ref()
        .map_err(|e| Error::schema(format!("built-in pattern failed to compile: {}", e)))
}

/// Fail-fast driver: the first element `check` rejects becomes the verdict
pub(crate) fn first_failure<F>(values: &[Value], mut check: F) -> Result<Verdict>
where
    F: FnMut(usize, &Value) -> Result<Option<attrflow_core::ErrorRecord>>,
{
    for (index, value) in values.iter().enumerate() {
        if let Some(record) = check(index, value)? {
            return Ok(Verdict::fail(record));
        }
    }
    Ok(Verdict::pass())
}
