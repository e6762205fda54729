//! Type registry
//!
//! Maps type names to [`AttributeType`] handles. The registry is built once
//! at schema-load time and only read afterwards; share it behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use attrflow_core::{Error, Result, Value};
use tracing::trace;

use crate::acl::AclSetType;
use crate::builtin::{
    AnyType, BinaryType, BooleanType, DateType, IntegerType, JsonType, StringType,
    TimestampType, UnicodeStringType,
};

/// Contract every attribute type implements
///
/// Conversions are declared per pair: a type knows how to turn its own
/// values into some sibling types (`convert_to`) and how to build its values
/// from others (`convert_from`). Unknown pairs return
/// [`Error::UnsupportedConversion`].
pub trait AttributeType: Send + Sync {
    /// Registry name of the type
    fn name(&self) -> &'static str;

    /// Structural check of a value list
    fn is_valid_value(&self, values: &[Value]) -> bool;

    /// Type-aware equality used for change detection
    fn values_match(&self, a: &[Value], b: &[Value]) -> bool {
        a == b
    }

    /// Normalize values to the canonical storage form
    fn fixup(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        Ok(values)
    }

    /// Convert values of this type into `target`
    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        let _ = values;
        Err(Error::unsupported_conversion(self.name(), target))
    }

    /// Build values of this type from values of `source`
    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        let _ = values;
        Err(Error::unsupported_conversion(source, self.name()))
    }
}

/// Named registry of attribute types
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, Arc<dyn AttributeType>>,
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TypeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in type
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StringType));
        registry.register(Arc::new(UnicodeStringType));
        registry.register(Arc::new(IntegerType));
        registry.register(Arc::new(BooleanType));
        registry.register(Arc::new(BinaryType));
        registry.register(Arc::new(DateType));
        registry.register(Arc::new(TimestampType));
        registry.register(Arc::new(AclSetType));
        registry.register(Arc::new(AnyType));
        registry.register(Arc::new(JsonType));
        registry
    }

    /// Add or replace a type
    pub fn register(&mut self, handle: Arc<dyn AttributeType>) {
        self.types.insert(handle.name().to_string(), handle);
    }

    /// Look up a type
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AttributeType>> {
        self.types.get(name)
    }

    /// Look up a type that must exist
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaConfiguration`] for unknown names.
    pub fn require(&self, name: &str) -> Result<&Arc<dyn AttributeType>> {
        self.get(name)
            .ok_or_else(|| Error::schema(format!("unknown attribute type '{}'", name)))
    }

    /// Registered type names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Convert `values` of type `from` into type `to` for attribute `attribute`
    ///
    /// Tries `from.convert_to(to)` first, then `to.convert_from(from)`.
    /// Identical type names convert as identity.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedConversion`] naming both types and the attribute
    /// when neither side declares the conversion; [`Error::TypeConversion`]
    /// for malformed source data.
    pub fn convert(&self, from: &str, to: &str, values: &[Value], attribute: &str) -> Result<Vec<Value>> {
        if from == to {
            return Ok(values.to_vec());
        }
        let source = self.require(from)?;
        let target = self.require(to)?;
        trace!(attribute, from, to, count = values.len(), "converting values");
        match source.convert_to(to, values) {
            Err(Error::UnsupportedConversion { .. }) => target
                .convert_from(from, values)
                .map_err(|e| e.with_attribute(attribute)),
            other => other.map_err(|e| e.with_attribute(attribute)),
        }
    }

    /// Type-aware equality through the named type
    pub fn values_match(&self, type_name: &str, a: &[Value], b: &[Value]) -> Result<bool> {
        Ok(self.require(type_name)?.values_match(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = TypeRegistry::with_builtins();
        for name in [
            "String",
            "UnicodeString",
            "Integer",
            "Boolean",
            "Binary",
            "Date",
            "Timestamp",
            "AclSet",
            "Any",
            "Json",
        ] {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn test_identity_conversion() {
        let registry = TypeRegistry::with_builtins();
        let values = vec![Value::Int(3)];
        assert_eq!(
            registry.convert("Integer", "Integer", &values, "n").unwrap(),
            values
        );
    }

    #[test]
    fn test_falls_back_to_convert_from() {
        // Boolean declares convert_from(String) but String has no convert_to(Boolean)
        let registry = TypeRegistry::with_builtins();
        let out = registry
            .convert("UnicodeString", "Boolean", &[Value::from("False")], "locked")
            .unwrap();
        assert_eq!(out, vec![Value::Bool(false)]);
    }

    #[test]
    fn test_unsupported_conversion_names_attribute() {
        let registry = TypeRegistry::with_builtins();
        let err = registry
            .convert("Boolean", "Date", &[Value::Bool(true)], "isLocked")
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedConversion {
                from_type: "Boolean".into(),
                to_type: "Date".into(),
                attribute: "isLocked".into(),
            }
        );
    }

    #[test]
    fn test_unsupported_conversion_of_empty_list() {
        let registry = TypeRegistry::with_builtins();
        assert!(matches!(
            registry.convert("Boolean", "Date", &[], "isLocked"),
            Err(Error::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_schema_error() {
        let registry = TypeRegistry::with_builtins();
        assert!(matches!(
            registry.convert("Nope", "String", &[], "x"),
            Err(Error::SchemaConfiguration(_))
        ));
    }
}
