//! Core types and traits for attrflow
//!
//! This crate defines the foundational types used throughout the engine:
//! - Value: Unified value enum for attribute elements
//! - AttributeValue / ValueTable: Per-object attribute working set
//! - ArtifactPlan: Artifact store changes queued during a save
//! - Error: Error taxonomy shared by all layers
//! - ErrorRecord / Verdict: Structured, localizable validation results
//! - Query / Record: Search query model
//! - Traits: Collaborator contracts (Search, Backend, AclOracle, ObjectProxy, ...)
//! - Memory: In-memory implementations of every collaborator

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod env;
pub mod error;
pub mod memory;
pub mod record;
pub mod search;
pub mod table;
pub mod traits;
pub mod value;

pub use artifact::ArtifactPlan;
pub use env::{Collaborators, ObjectRef};
pub use error::{Error, Result};
pub use memory::{MemoryAcl, MemoryArtifacts, MemoryDirectory, MemoryMoves};
pub use record::{ErrorRecord, Verdict};
pub use search::{Match, Query, Record};
pub use table::{AttributeValue, ValueTable};
pub use traits::{
    AclOracle, ArtifactStore, Backend, MoveTracker, ObjectHandle, ObjectProxy, Params, Search,
};
pub use value::Value;
