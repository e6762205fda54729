//! Object engine for attrflow
//!
//! This crate ties the lower layers together:
//! - Schemas: per-type attribute declarations compiled into programs
//! - Object pipeline: load, set, validate, save and remove
//! - Relations: virtual attributes backed by foreign objects
//! - Configuration: `attrflow.toml`
//!
//! The engine is the only component that knows about backends, ACLs and
//! schemas at once.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod object;
pub mod registries;
pub mod relation;
pub mod schema;

pub use config::{EngineConfig, CONFIG_FILE_NAME};
pub use error::{AttributeError, EngineError, EngineResult};
pub use object::{Object, ObjectEngine};
pub use registries::Registries;
pub use relation::{ImportState, RelationMapping, RelationPlan, RelationResolver};
pub use schema::{
    read_schema, read_schema_dir, AttributeDefinition, CompiledAttribute, CompiledSchema,
    ObjectSchema,
};
