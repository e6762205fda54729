//! attrflow - declarative attribute transformation for directory-backed objects
//!
//! Objects (users, groups, hosts, ...) live in pluggable backends and are
//! exposed through attribute schemas declared in JSON files. Each attribute
//! may carry rules that run when it is read (`in_filter`), written
//! (`out_filter`) or validated (`validator`), and may be virtual: derived from
//! other objects through a relation.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use attrflow::{Collaborators, EngineConfig, MemoryDirectory, ObjectEngine, Registries, Value};
//!
//! let directory = Arc::new(MemoryDirectory::new());
//! let env = Collaborators::in_memory("mem", directory);
//! let engine = ObjectEngine::new(EngineConfig::default(), Arc::new(Registries::builtin()), env)?;
//! engine.load_schema_dir("schema".as_ref())?;
//!
//! let mut user = engine.create("User")?;
//! engine.set(&mut user, "uid", vec![Value::from("jdoe")])?;
//! let uuid = engine.save(&mut user, None)?;
//! ```
//!
//! # Architecture
//!
//! Rule trees are compiled once per schema into flat programs
//! ([`compiler`]) and run by a small stack machine ([`executor`]) against
//! the object's value table. Filters ([`filters`]) transform values,
//! comparators ([`validators`]) check them, and the type registry
//! ([`types`]) converts between application and storage forms. The
//! [`ObjectEngine`] drives the whole load and save pipeline.

pub use attrflow_compiler as compiler;
pub use attrflow_core as core;
pub use attrflow_engine as engine;
pub use attrflow_executor as executor;
pub use attrflow_filters as filters;
pub use attrflow_types as types;
pub use attrflow_validators as validators;

pub use attrflow_core::{
    AclOracle, AttributeValue, Backend, Collaborators, Error, ErrorRecord, MemoryAcl,
    MemoryArtifacts, MemoryDirectory, MemoryMoves, ObjectRef, Query, Record, Result, Search,
    Value, ValueTable, Verdict,
};
pub use attrflow_engine::{
    AttributeError, EngineConfig, EngineError, EngineResult, Object, ObjectEngine, ObjectSchema,
    Registries,
};
