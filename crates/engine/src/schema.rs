//! Object schemas
//!
//! One JSON file per object type declares its attributes: types, storage,
//! constraints and the rules that run on load (`in_filter`), on save
//! (`out_filter`) and on validation (`validator`).
//!
//! ```json
//! {
//!   "name": "User",
//!   "backend": "mem",
//!   "attributes": [
//!     {"name": "uid", "type": "String", "mandatory": true,
//!      "validator": {"condition": {"name": "RegEx", "params": ["[a-z][a-z0-9]*"]}}},
//!     {"name": "groupMembership", "type": "UnicodeString", "multivalue": true,
//!      "relation": "PosixGroup:cn,memberUid=uid"}
//!   ]
//! }
//! ```
//!
//! Schemas are compiled once; programs are shared behind `Arc`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use attrflow_compiler::{ConditionChain, FilterChain, Program};
use attrflow_core::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::registries::Registries;
use crate::relation::{RelationMapping, RelationResolver};

// =============================================================================
// Definitions (as written in schema files)
// =============================================================================

/// Declared object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Object type name
    pub name: String,
    /// Backend storing objects of this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Declared attributes, in evaluation order
    pub attributes: Vec<AttributeDefinition>,
}

/// Declared attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute name
    pub name: String,
    /// Application-level type
    #[serde(rename = "type")]
    pub value_type: String,
    /// Storage type, defaults to the application type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    /// Backends eligible to host the attribute, defaults to the object's
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend: Vec<String>,
    /// More than one value allowed
    #[serde(default)]
    pub multivalue: bool,
    /// At least one value required on save
    #[serde(default)]
    pub mandatory: bool,
    /// Cannot be set through the engine
    #[serde(default)]
    pub readonly: bool,
    /// Never written by the generic save path
    #[serde(default)]
    pub skip_save: bool,
    /// Values of new objects
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<serde_json::Value>,
    /// Condition the values must satisfy on save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<ConditionChain>,
    /// Rule run after load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_filter: Option<FilterChain>,
    /// Rule run before save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_filter: Option<FilterChain>,
    /// Relation configuration making the attribute virtual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// Attributes whose changes also mark this one changed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl AttributeDefinition {
    /// Plain stored attribute of the given type
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        AttributeDefinition {
            name: name.into(),
            value_type: value_type.into(),
            backend_type: None,
            backend: Vec::new(),
            multivalue: false,
            mandatory: false,
            readonly: false,
            skip_save: false,
            default: Vec::new(),
            validator: None,
            in_filter: None,
            out_filter: None,
            relation: None,
            depends_on: Vec::new(),
        }
    }
}

// =============================================================================
// Compiled form
// =============================================================================

/// Attribute with its programs resolved
#[derive(Debug, Clone)]
pub struct CompiledAttribute {
    /// Declaration
    pub definition: AttributeDefinition,
    /// Effective storage type
    pub backend_type: String,
    /// Effective backends
    pub backends: Vec<String>,
    /// Default values
    pub defaults: Vec<Value>,
    /// Program run after load
    pub in_program: Option<Arc<Program>>,
    /// Program run before save
    pub out_program: Option<Arc<Program>>,
    /// Condition-only program run on save
    pub validator: Option<Arc<Program>>,
    /// Relation making the attribute virtual
    pub relation: Option<Arc<RelationMapping>>,
}

impl CompiledAttribute {
    /// Attribute name
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Application type name
    pub fn value_type(&self) -> &str {
        &self.definition.value_type
    }

    /// Backed by other objects
    pub fn is_virtual(&self) -> bool {
        self.relation.is_some()
    }
}

/// Object type ready for load and save
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    name: String,
    backend: String,
    attributes: Vec<CompiledAttribute>,
    index: BTreeMap<String, usize>,
}

impl CompiledSchema {
    /// Compile a declaration
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for duplicate attributes, unknown
    /// types, filters or comparators, malformed relations, relations whose
    /// local match attribute is not declared, and defaults that violate the
    /// attribute's multiplicity.
    pub fn compile(
        schema: &ObjectSchema,
        registries: &Registries,
        relations: &RelationResolver,
        default_backend: &str,
    ) -> Result<Self> {
        let backend = schema
            .backend
            .clone()
            .unwrap_or_else(|| default_backend.to_string());

        let mut index = BTreeMap::new();
        for (position, def) in schema.attributes.iter().enumerate() {
            if index.insert(def.name.clone(), position).is_some() {
                return Err(Error::schema(format!(
                    "{}: attribute '{}' declared twice",
                    schema.name, def.name
                )));
            }
        }

        let compiler = registries.compiler();
        let mut attributes = Vec::with_capacity(schema.attributes.len());
        for def in &schema.attributes {
            let context = |e: Error| match e {
                Error::SchemaConfiguration(msg) => {
                    Error::schema(format!("{}.{}: {}", schema.name, def.name, msg))
                }
                other => other,
            };

            registries.types.require(&def.value_type).map_err(context)?;
            let backend_type = def
                .backend_type
                .clone()
                .unwrap_or_else(|| def.value_type.clone());
            registries.types.require(&backend_type).map_err(context)?;

            let defaults: Vec<Value> = def.default.iter().cloned().map(Value::from).collect();
            if !def.multivalue && defaults.len() > 1 {
                return Err(context(Error::schema("single-valued attribute with several defaults")));
            }

            let program = |chain: &Option<FilterChain>| -> Result<Option<Arc<Program>>> {
                chain
                    .as_ref()
                    .map(|c| compiler.compile(c).map(Arc::new))
                    .transpose()
                    .map_err(context)
            };
            let in_program = program(&def.in_filter)?;
            let out_program = program(&def.out_filter)?;
            let validator = def
                .validator
                .as_ref()
                .map(|c| compiler.compile_condition(c).map(Arc::new))
                .transpose()
                .map_err(context)?;

            let relation = match &def.relation {
                None => None,
                Some(raw) => {
                    let mapping = relations.mapping(&schema.name, &def.name, raw).map_err(context)?;
                    if !index.contains_key(&mapping.target_attribute) {
                        return Err(context(Error::schema(format!(
                            "relation target '{}' is not declared",
                            mapping.target_attribute
                        ))));
                    }
                    if !index.contains_key(&mapping.local_match_attribute) {
                        return Err(context(Error::schema(format!(
                            "relation match attribute '{}' is not declared",
                            mapping.local_match_attribute
                        ))));
                    }
                    Some(mapping)
                }
            };

            if let Some(missing) = def.depends_on.iter().find(|d| !index.contains_key(d.as_str())) {
                return Err(context(Error::schema(format!(
                    "depends on undeclared attribute '{}'",
                    missing
                ))));
            }

            let backends = if def.backend.is_empty() {
                vec![backend.clone()]
            } else {
                def.backend.clone()
            };

            attributes.push(CompiledAttribute {
                definition: def.clone(),
                backend_type,
                backends,
                defaults,
                in_program,
                out_program,
                validator,
                relation,
            });
        }

        debug!(object_type = %schema.name, attributes = attributes.len(), "compiled schema");
        Ok(CompiledSchema {
            name: schema.name.clone(),
            backend,
            attributes,
            index,
        })
    }

    /// Object type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend storing new objects
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Attribute by name
    pub fn attribute(&self, name: &str) -> Option<&CompiledAttribute> {
        self.index.get(name).and_then(|i| self.attributes.get(*i))
    }

    /// Attribute that must be declared
    ///
    /// # Errors
    ///
    /// [`Error::UnknownAttribute`] otherwise.
    pub fn require(&self, name: &str) -> Result<&CompiledAttribute> {
        self.attribute(name)
            .ok_or_else(|| Error::UnknownAttribute(format!("{}.{}", self.name, name)))
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = &CompiledAttribute> {
        self.attributes.iter()
    }

    /// Every backend any attribute lives on
    pub fn backends(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for backend in self.attributes.iter().flat_map(|a| a.backends.iter()) {
            if !out.contains(&backend.as_str()) {
                out.push(backend);
            }
        }
        out
    }
}

// =============================================================================
// Files
// =============================================================================

/// Parse one schema file
///
/// # Errors
///
/// [`Error::Config`] when the file cannot be read,
/// [`Error::SchemaConfiguration`] when it is not a valid schema.
pub fn read_schema(path: &Path) -> Result<ObjectSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read schema '{}': {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::schema(format!("{}: {}", path.display(), e)))
}

/// Parse every `*.json` schema in a directory, sorted by file name
///
/// # Errors
///
/// Same as [`read_schema`], plus [`Error::Config`] for an unreadable
/// directory.
pub fn read_schema_dir(dir: &Path) -> Result<Vec<ObjectSchema>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Config(format!("Failed to read schema directory '{}': {}", dir.display(), e)))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::Config(format!("Failed to list '{}': {}", dir.display(), e)))?
            .path();
        if path.extension().map_or(false, |ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    let schemas = paths
        .iter()
        .map(|p| read_schema(p))
        .collect::<Result<Vec<_>>>()?;
    info!(dir = %dir.display(), count = schemas.len(), "read object schemas");
    Ok(schemas)
}
