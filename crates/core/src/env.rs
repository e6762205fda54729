//! Collaborator bundle handed to filters, comparators and the resolver

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::memory::{MemoryAcl, MemoryArtifacts, MemoryDirectory, MemoryMoves};
use crate::traits::{AclOracle, ArtifactStore, Backend, MoveTracker, ObjectProxy, Search};

/// Identity of the object a program runs for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectRef {
    /// Object uuid (empty for objects not yet created)
    pub uuid: String,
    /// Object type name
    pub object_type: String,
    /// Distinguished name, when known
    pub dn: Option<String>,
}

impl ObjectRef {
    /// Reference an object by type and uuid
    pub fn new(object_type: impl Into<String>, uuid: impl Into<String>) -> Self {
        ObjectRef {
            uuid: uuid.into(),
            object_type: object_type.into(),
            dn: None,
        }
    }

    /// Builder: set the distinguished name
    pub fn with_dn(mut self, dn: impl Into<String>) -> Self {
        self.dn = Some(dn.into());
        self
    }
}

/// External collaborators the engine consults
///
/// Cheap to clone; every member is reference counted.
#[derive(Clone)]
pub struct Collaborators {
    /// Cross-object search
    pub search: Arc<dyn Search>,
    /// Backends by name
    pub backends: BTreeMap<String, Arc<dyn Backend>>,
    /// Permission oracle
    pub acl: Arc<dyn AclOracle>,
    /// Relocation oracle
    pub moves: Arc<dyn MoveTracker>,
    /// Foreign object access
    pub proxy: Arc<dyn ObjectProxy>,
    /// Side artifact storage
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl Collaborators {
    /// Wire every contract to one in-memory directory registered as backend `name`
    pub fn in_memory(name: &str, directory: Arc<MemoryDirectory>) -> Self {
        let mut backends: BTreeMap<String, Arc<dyn Backend>> = BTreeMap::new();
        backends.insert(name.to_string(), directory.clone());
        Collaborators {
            search: directory.clone(),
            backends,
            acl: Arc::new(MemoryAcl::allow_all()),
            moves: Arc::new(MemoryMoves::new()),
            proxy: directory,
            artifacts: Arc::new(MemoryArtifacts::new()),
        }
    }

    /// Builder: replace the ACL oracle
    pub fn with_acl(mut self, acl: Arc<dyn AclOracle>) -> Self {
        self.acl = acl;
        self
    }

    /// Builder: replace the relocation oracle
    pub fn with_moves(mut self, moves: Arc<dyn MoveTracker>) -> Self {
        self.moves = moves;
        self
    }

    /// Builder: replace the artifact store
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Builder: register an additional backend
    pub fn with_backend(mut self, name: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        self.backends.insert(name.into(), backend);
        self
    }

    /// Look up a backend by name
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaConfiguration`] when no backend has that name.
    pub fn backend(&self, name: &str) -> Result<&Arc<dyn Backend>> {
        self.backends
            .get(name)
            .ok_or_else(|| Error::schema(format!("no backend named '{}'", name)))
    }

    /// First backend of `candidates` that is registered
    pub fn first_backend(&self, candidates: &[String]) -> Result<&Arc<dyn Backend>> {
        candidates
            .iter()
            .find_map(|name| self.backends.get(name))
            .ok_or_else(|| {
                Error::schema(format!(
                    "none of the backends {:?} is registered",
                    candidates
                ))
            })
    }
}
