//! Test modules for the executor crate.

pub mod branching;

use attrflow_compiler::{Compiler, FilterChain, Program};
use attrflow_core::{AttributeValue, Collaborators, MemoryDirectory, ObjectRef, Value, ValueTable};
use attrflow_filters::{FilterContext, FilterRegistry, FilterSettings};
use attrflow_types::TypeRegistry;
use attrflow_validators::ComparatorRegistry;
use std::sync::Arc;

/// Owned world a test executor borrows from
pub struct World {
    pub object: ObjectRef,
    pub env: Collaborators,
    pub types: TypeRegistry,
    pub settings: FilterSettings,
    pub filters: FilterRegistry,
    pub comparators: ComparatorRegistry,
}

impl World {
    pub fn new() -> Self {
        World {
            object: ObjectRef::new("User", "u-1"),
            env: Collaborators::in_memory("mem", Arc::new(MemoryDirectory::new())),
            types: TypeRegistry::with_builtins(),
            settings: FilterSettings::default(),
            filters: FilterRegistry::with_builtins(),
            comparators: ComparatorRegistry::with_builtins(),
        }
    }

    pub fn ctx(&self) -> FilterContext<'_> {
        FilterContext::new(&self.object, &self.env, &self.types, &self.settings)
    }

    /// Compile a rule given as JSON
    pub fn compile(&self, json: &str) -> Program {
        let chain: FilterChain = serde_json::from_str(json).unwrap();
        Compiler::new(&self.filters, &self.comparators)
            .compile(&chain)
            .unwrap()
    }
}

pub fn table(entries: &[(&str, &[&str])]) -> ValueTable {
    let mut table = ValueTable::new();
    for (name, values) in entries {
        table.insert(
            *name,
            AttributeValue::new("UnicodeString")
                .with_values(values.iter().map(|v| Value::from(*v)).collect())
                .with_backends(["mem"]),
        );
    }
    table
}

pub fn strings(table: &ValueTable, key: &str) -> Vec<String> {
    table
        .values(key)
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}
