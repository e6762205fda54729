//! Per-object attribute working set
//!
//! A [`ValueTable`] is created when an object is loaded and dropped when the
//! object handle is closed. It is threaded by mutable reference through every
//! filter and condition of a program, so one filter step can read and write
//! attributes other than its own key (this is how composite attributes such
//! as flag strings are built from several boolean attributes).
//!
//! The set of known attribute names comes from the schema at load time.
//! [`ValueTable::require`] / [`ValueTable::require_mut`] reject unknown names;
//! only [`ValueTable::entry`] may create a slot.

use crate::artifact::ArtifactPlan;
use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named slot in an object's working set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// Current, possibly edited values (order is significant)
    pub current: Vec<Value>,
    /// Values as loaded from the backend, used for diffing
    pub original: Vec<Value>,
    /// Application-level type declared in the schema
    pub value_type: String,
    /// Storage-level type; filters may change it mid-chain
    pub backend_type: String,
    /// Suppress the generic save path for this attribute
    pub skip_save: bool,
    /// Ordered set of backends eligible to host this attribute
    pub backend: Vec<String>,
}

impl AttributeValue {
    /// Empty slot of the given type; the backend type starts out identical
    pub fn new(value_type: impl Into<String>) -> Self {
        let value_type = value_type.into();
        AttributeValue {
            current: Vec::new(),
            original: Vec::new(),
            backend_type: value_type.clone(),
            value_type,
            skip_save: false,
            backend: Vec::new(),
        }
    }

    /// Slot populated from storage: `current` and `original` start identical
    pub fn loaded(values: Vec<Value>, value_type: &str, backend_type: &str) -> Self {
        AttributeValue {
            current: values.clone(),
            original: values,
            value_type: value_type.to_string(),
            backend_type: backend_type.to_string(),
            skip_save: false,
            backend: Vec::new(),
        }
    }

    /// Builder: set the current values
    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.current = values;
        self
    }

    /// Builder: set the backend type
    pub fn with_backend_type(mut self, backend_type: impl Into<String>) -> Self {
        self.backend_type = backend_type.into();
        self
    }

    /// Builder: set the eligible backends, dropping duplicates
    pub fn with_backends<I, S>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backend.clear();
        for name in backends {
            self.add_backend(name);
        }
        self
    }

    /// Append a backend if not already present
    pub fn add_backend(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.backend.contains(&name) {
            self.backend.push(name);
        }
    }

    /// First current value, if any
    pub fn first(&self) -> Option<&Value> {
        self.current.first()
    }

    /// No current values
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Raw (variant-exact) comparison of current against original
    ///
    /// Type-aware change detection goes through the type registry.
    pub fn is_modified(&self) -> bool {
        self.current != self.original
    }

    /// Mark the current values as persisted
    pub fn commit(&mut self) {
        self.original = self.current.clone();
    }
}

/// Attribute name -> value record for one object instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueTable {
    entries: BTreeMap<String, AttributeValue>,
    #[serde(skip)]
    artifacts: ArtifactPlan,
}

impl ValueTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a slot
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.entries.insert(name.into(), value);
    }

    /// Remove a slot
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.entries.remove(name)
    }

    /// Look up a slot
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.get(name)
    }

    /// Look up a slot mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttributeValue> {
        self.entries.get_mut(name)
    }

    /// Look up a slot that must exist
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] for undeclared names.
    pub fn require(&self, name: &str) -> Result<&AttributeValue> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::UnknownAttribute(name.to_string()))
    }

    /// Mutable variant of [`ValueTable::require`]
    pub fn require_mut(&mut self, name: &str) -> Result<&mut AttributeValue> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| Error::UnknownAttribute(name.to_string()))
    }

    /// Get a slot, creating an empty one of `value_type` if missing
    pub fn entry(&mut self, name: &str, value_type: &str) -> &mut AttributeValue {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| AttributeValue::new(value_type))
    }

    /// Current values of an attribute, empty if the attribute is unknown
    pub fn values(&self, name: &str) -> &[Value] {
        self.entries
            .get(name)
            .map(|v| v.current.as_slice())
            .unwrap_or(&[])
    }

    /// Replace the current values of a declared attribute
    pub fn set_values(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        self.require_mut(name)?.current = values;
        Ok(())
    }

    /// Whether a slot exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Attribute names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over all slots in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Table has no slots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Artifact changes queued by filters
    pub fn artifacts(&self) -> &ArtifactPlan {
        &self.artifacts
    }

    /// Queue artifact changes
    pub fn artifacts_mut(&mut self) -> &mut ArtifactPlan {
        &mut self.artifacts
    }

    /// Hand the queued artifact changes to the caller, leaving none behind
    pub fn take_artifacts(&mut self) -> ArtifactPlan {
        std::mem::take(&mut self.artifacts)
    }
}
