//! Name registries owned by an engine

use attrflow_compiler::Compiler;
use attrflow_filters::FilterRegistry;
use attrflow_types::TypeRegistry;
use attrflow_validators::ComparatorRegistry;

/// Types, filters and comparators an engine resolves names against
///
/// Built once, before any schema is compiled, and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    /// Attribute types
    pub types: TypeRegistry,
    /// Value transformers
    pub filters: FilterRegistry,
    /// Validators and conditions
    pub comparators: ComparatorRegistry,
}

impl Registries {
    /// Every built-in type, filter and comparator
    pub fn builtin() -> Self {
        Registries {
            types: TypeRegistry::with_builtins(),
            filters: FilterRegistry::with_builtins(),
            comparators: ComparatorRegistry::with_builtins(),
        }
    }

    /// Rule compiler over these registries
    pub fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.filters, &self.comparators)
    }
}
