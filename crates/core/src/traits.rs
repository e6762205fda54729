//! Collaborator contracts
//!
//! The engine performs no I/O of its own. Everything that touches storage,
//! permissions or other objects goes through these traits, so concrete
//! drivers (directory protocol, SQL, REST) can be swapped without touching
//! the transformation engine.
//!
//! Thread safety: all collaborators must be `Send + Sync`; programs and
//! registries holding them are shared across concurrent object operations.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::search::{Query, Record};
use crate::value::Value;

/// Free-form backend parameters (`key -> value`)
pub type Params = BTreeMap<String, String>;

/// Attribute-equality search over all known objects
pub trait Search: Send + Sync {
    /// Return the projected records matching `query`, in a stable order
    ///
    /// An empty projection returns every attribute of each match.
    fn search(&self, query: &Query, projection: &[&str]) -> Result<Vec<Record>>;
}

/// Storage backend contract
///
/// `extend` and `retract` default to [`Error::UnsupportedOperation`]; backends
/// without extension support do not need to override them.
pub trait Backend: Send + Sync {
    /// Load the given attributes of an object
    fn load(&self, uuid: &str, attributes: &[&str]) -> Result<Record>;

    /// Create an object and return its uuid
    fn create(&self, object_type: &str, values: &Record, params: &Params) -> Result<String>;

    /// Replace the listed attributes; an empty value list removes the attribute
    fn update(&self, uuid: &str, values: &Record, params: &Params) -> Result<()>;

    /// Attach an extension with its attributes
    fn extend(&self, uuid: &str, extension: &str, values: &Record, params: &Params) -> Result<()> {
        let _ = (uuid, values, params);
        Err(Error::UnsupportedOperation(format!(
            "backend cannot extend objects with '{}'",
            extension
        )))
    }

    /// Detach an extension and drop its attributes
    fn retract(&self, uuid: &str, extension: &str, attributes: &[&str], params: &Params) -> Result<()> {
        let _ = (uuid, attributes, params);
        Err(Error::UnsupportedOperation(format!(
            "backend cannot retract extension '{}'",
            extension
        )))
    }

    /// Delete an object
    fn remove(&self, uuid: &str, params: &Params) -> Result<()>;

    /// True when no other object carries `attribute = value`
    fn is_uniq(&self, attribute: &str, value: &Value, object_type: Option<&str>) -> Result<bool>;

    /// Allocate the next free numeric id for `attribute` (uidNumber, gidNumber, ...)
    fn get_next_id(&self, attribute: &str) -> Result<i64>;
}

/// Permission resolver, consulted as a yes/no oracle
pub trait AclOracle: Send + Sync {
    /// May `user` exercise `permission` on `topic` (optionally below `base`)?
    fn check(&self, user: &str, topic: &str, permission: &str, base: Option<&str>) -> bool;

    /// Whether an ACL role with this name is defined
    fn role_exists(&self, name: &str) -> bool;
}

/// Tracks objects currently being renamed or moved
///
/// Existence comparators consult this before reporting a DN as missing, to
/// avoid false negatives while an object is relocated.
pub trait MoveTracker: Send + Sync {
    /// Whether `dn` is the source or destination of an in-flight move
    fn is_moving(&self, dn: &str) -> bool;
}

/// Mutable handle on a foreign object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHandle {
    /// Object uuid
    pub uuid: String,
    /// Object type name
    pub object_type: String,
    /// Attribute values; edits are persisted by [`ObjectProxy::commit`]
    pub attributes: Record,
}

impl ObjectHandle {
    /// Current values of an attribute, empty when absent
    pub fn values(&self, attribute: &str) -> &[Value] {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Mutable value list of an attribute, created empty when absent
    pub fn values_mut(&mut self, attribute: &str) -> &mut Vec<Value> {
        self.attributes.entry(attribute.to_string()).or_default()
    }
}

/// Opens and commits other objects
pub trait ObjectProxy: Send + Sync {
    /// Open an object for editing
    fn open(&self, object_type: &str, uuid: &str) -> Result<ObjectHandle>;

    /// Persist the edits made on a handle
    fn commit(&self, handle: ObjectHandle) -> Result<()>;
}

/// Store for side artifacts produced by filters (resized images, cached files)
pub trait ArtifactStore: Send + Sync {
    /// Whether an artifact exists
    fn exists(&self, name: &str) -> Result<bool>;

    /// Store an artifact, replacing any previous content
    fn put(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Remove an artifact; returns whether it existed
    fn remove(&self, name: &str) -> Result<bool>;
}
