//! In-memory collaborators
//!
//! Reference implementations of every collaborator contract, backed by
//! process memory. All data is lost when the process exits.
//!
//! # Use Cases
//!
//! - Unit and integration tests (fast, no cleanup needed)
//! - Embedding the engine without a directory server
//! - Prototyping schemas and rule files
//!
//! # Thread Safety
//!
//! State is guarded by `parking_lot` locks; every type is `Send + Sync`.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::search::{self, Query, Record, DN, EXTENSIONS, TYPE, UUID};
use crate::traits::{
    AclOracle, ArtifactStore, Backend, MoveTracker, ObjectHandle, ObjectProxy, Params, Search,
};
use crate::value::Value;

/// First id handed out by [`Backend::get_next_id`] when no object carries one yet
pub const DEFAULT_ID_BASE: i64 = 1000;

// =============================================================================
// Directory: Search + Backend + ObjectProxy
// =============================================================================

/// Object store implementing [`Search`], [`Backend`] and [`ObjectProxy`]
///
/// Objects are records keyed by uuid; the identity keys `_uuid`, `_type`,
/// `_extensions` and `dn` are stored alongside ordinary attributes.
#[derive(Debug)]
pub struct MemoryDirectory {
    objects: RwLock<BTreeMap<String, Record>>,
    id_base: i64,
    counters: Mutex<BTreeMap<String, i64>>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::with_id_base(DEFAULT_ID_BASE)
    }

    /// Empty directory whose id allocation starts at `id_base`
    pub fn with_id_base(id_base: i64) -> Self {
        MemoryDirectory {
            objects: RwLock::new(BTreeMap::new()),
            id_base,
            counters: Mutex::new(BTreeMap::new()),
        }
    }

    /// Insert an object directly, returning its uuid
    pub fn insert(
        &self,
        object_type: &str,
        uuid: &str,
        dn: Option<&str>,
        attributes: Record,
    ) -> String {
        let mut record = attributes;
        record.insert(UUID.into(), vec![Value::from(uuid)]);
        record.insert(TYPE.into(), vec![Value::from(object_type)]);
        if let Some(dn) = dn {
            record.insert(DN.into(), vec![Value::from(dn)]);
        }
        self.objects.write().insert(uuid.to_string(), record);
        uuid.to_string()
    }

    /// Full record of an object
    pub fn get(&self, uuid: &str) -> Option<Record> {
        self.objects.read().get(uuid).cloned()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// No objects stored
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn merge(record: &mut Record, values: &Record) {
        for (attr, vals) in values {
            if is_identity_key(attr) {
                continue;
            }
            if vals.is_empty() {
                record.remove(attr);
            } else {
                record.insert(attr.clone(), vals.clone());
            }
        }
    }
}

fn is_identity_key(attr: &str) -> bool {
    matches!(attr, UUID | TYPE | EXTENSIONS)
}

fn not_found(uuid: &str) -> Error {
    Error::backend(format!("object '{}' not found", uuid))
}

impl Search for MemoryDirectory {
    fn search(&self, query: &Query, projection: &[&str]) -> Result<Vec<Record>> {
        let objects = self.objects.read();
        Ok(objects
            .values()
            .filter(|record| query.matches(record))
            .map(|record| search::project(record, projection))
            .collect())
    }
}

impl Backend for MemoryDirectory {
    fn load(&self, uuid: &str, attributes: &[&str]) -> Result<Record> {
        let objects = self.objects.read();
        let record = objects.get(uuid).ok_or_else(|| not_found(uuid))?;
        Ok(search::project(record, attributes))
    }

    fn create(&self, object_type: &str, values: &Record, _params: &Params) -> Result<String> {
        let uuid = Uuid::new_v4().to_string();
        let mut record = Record::new();
        Self::merge(&mut record, values);
        self.insert(object_type, &uuid, None, record);
        debug!(uuid = %uuid, object_type, "created object");
        Ok(uuid)
    }

    fn update(&self, uuid: &str, values: &Record, _params: &Params) -> Result<()> {
        let mut objects = self.objects.write();
        let record = objects.get_mut(uuid).ok_or_else(|| not_found(uuid))?;
        Self::merge(record, values);
        Ok(())
    }

    fn extend(&self, uuid: &str, extension: &str, values: &Record, _params: &Params) -> Result<()> {
        let mut objects = self.objects.write();
        let record = objects.get_mut(uuid).ok_or_else(|| not_found(uuid))?;
        let extensions = record.entry(EXTENSIONS.to_string()).or_default();
        let ext = Value::from(extension);
        if extensions.contains(&ext) {
            return Err(Error::backend(format!(
                "object '{}' already has extension '{}'",
                uuid, extension
            )));
        }
        extensions.push(ext);
        Self::merge(record, values);
        Ok(())
    }

    fn retract(&self, uuid: &str, extension: &str, attributes: &[&str], _params: &Params) -> Result<()> {
        let mut objects = self.objects.write();
        let record = objects.get_mut(uuid).ok_or_else(|| not_found(uuid))?;
        let ext = Value::from(extension);
        let extensions = record.entry(EXTENSIONS.to_string()).or_default();
        if !extensions.contains(&ext) {
            return Err(Error::backend(format!(
                "object '{}' has no extension '{}'",
                uuid, extension
            )));
        }
        extensions.retain(|e| e != &ext);
        if extensions.is_empty() {
            record.remove(EXTENSIONS);
        }
        for attr in attributes {
            record.remove(*attr);
        }
        Ok(())
    }

    fn remove(&self, uuid: &str, _params: &Params) -> Result<()> {
        self.objects
            .write()
            .remove(uuid)
            .map(|_| ())
            .ok_or_else(|| not_found(uuid))
    }

    fn is_uniq(&self, attribute: &str, value: &Value, object_type: Option<&str>) -> Result<bool> {
        let mut query = Query::new().eq(attribute, value.clone());
        if let Some(t) = object_type {
            query = query.eq(TYPE, t);
        }
        Ok(self.search(&query, &[UUID])?.is_empty())
    }

    fn get_next_id(&self, attribute: &str) -> Result<i64> {
        let highest_stored = self
            .objects
            .read()
            .values()
            .filter_map(|r| r.get(attribute))
            .flatten()
            .filter_map(|v| match v {
                Value::Int(i) => Some(*i),
                other => other.as_text().and_then(|t| t.parse::<i64>().ok()),
            })
            .max();
        let mut counters = self.counters.lock();
        let counter = counters.entry(attribute.to_string()).or_insert(self.id_base - 1);
        let next = (*counter).max(highest_stored.unwrap_or(self.id_base - 1)) + 1;
        *counter = next;
        Ok(next)
    }
}

impl ObjectProxy for MemoryDirectory {
    fn open(&self, object_type: &str, uuid: &str) -> Result<ObjectHandle> {
        let record = self.get(uuid).ok_or_else(|| not_found(uuid))?;
        let stored_type = record
            .get(TYPE)
            .and_then(|v| v.first())
            .and_then(Value::as_str)
            .unwrap_or_default();
        let extensions = record.get(EXTENSIONS).cloned().unwrap_or_default();
        if stored_type != object_type && !extensions.contains(&Value::from(object_type)) {
            return Err(Error::backend(format!(
                "object '{}' is a {}, not a {}",
                uuid, stored_type, object_type
            )));
        }
        Ok(ObjectHandle {
            uuid: uuid.to_string(),
            object_type: object_type.to_string(),
            attributes: record,
        })
    }

    fn commit(&self, handle: ObjectHandle) -> Result<()> {
        let mut objects = self.objects.write();
        let record = objects
            .get_mut(&handle.uuid)
            .ok_or_else(|| not_found(&handle.uuid))?;
        let stale: Vec<String> = record
            .keys()
            .filter(|k| !is_identity_key(k) && !handle.attributes.contains_key(*k))
            .cloned()
            .collect();
        for key in stale {
            record.remove(&key);
        }
        Self::merge(record, &handle.attributes);
        debug!(uuid = %handle.uuid, "committed object");
        Ok(())
    }
}

// =============================================================================
// ACL oracle
// =============================================================================

/// Permission oracle with an explicit grant list and role set
#[derive(Debug, Default)]
pub struct MemoryAcl {
    allow_all: bool,
    roles: RwLock<BTreeSet<String>>,
    grants: RwLock<BTreeSet<(String, String, String)>>,
}

impl MemoryAcl {
    /// Oracle that denies everything until grants are added
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle that grants every permission
    pub fn allow_all() -> Self {
        MemoryAcl {
            allow_all: true,
            ..Self::default()
        }
    }

    /// Define an ACL role
    pub fn add_role(&self, name: &str) {
        self.roles.write().insert(name.to_string());
    }

    /// Grant `user` every character of `permission` on `topic`
    pub fn grant(&self, user: &str, topic: &str, permission: &str) {
        let mut grants = self.grants.write();
        for c in permission.chars() {
            grants.insert((user.to_string(), topic.to_string(), c.to_string()));
        }
    }
}

impl AclOracle for MemoryAcl {
    fn check(&self, user: &str, topic: &str, permission: &str, _base: Option<&str>) -> bool {
        if self.allow_all {
            return true;
        }
        let grants = self.grants.read();
        permission.chars().all(|c| {
            grants.contains(&(user.to_string(), topic.to_string(), c.to_string()))
        })
    }

    fn role_exists(&self, name: &str) -> bool {
        self.roles.read().contains(name)
    }
}

// =============================================================================
// Relocation oracle
// =============================================================================

/// Set of DNs currently being moved
#[derive(Debug, Default)]
pub struct MemoryMoves {
    moving: RwLock<BTreeSet<String>>,
}

impl MemoryMoves {
    /// No moves in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a DN as moving
    pub fn begin(&self, dn: &str) {
        self.moving.write().insert(dn.to_string());
    }

    /// Clear a DN's moving mark
    pub fn finish(&self, dn: &str) {
        self.moving.write().remove(dn);
    }
}

impl MoveTracker for MemoryMoves {
    fn is_moving(&self, dn: &str) -> bool {
        self.moving.read().contains(dn)
    }
}

// =============================================================================
// Artifact store
// =============================================================================

/// Artifact store keeping blobs in a map
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArtifacts {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of an artifact
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(name).cloned()
    }

    /// Names of stored artifacts
    pub fn names(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }
}

impl ArtifactStore for MemoryArtifacts {
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.blobs.read().contains_key(name))
    }

    fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        self.blobs.write().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.blobs.write().remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.clone()]))
            .collect()
    }

    #[test]
    fn test_insert_and_search() {
        let dir = MemoryDirectory::new();
        dir.insert("User", "u1", Some("uid=a,dc=x"), attrs(&[("uid", "a".into())]));
        dir.insert("User", "u2", None, attrs(&[("uid", "b".into())]));
        let hits = dir.search(&Query::new().eq("uid", "b"), &[UUID]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0][UUID], vec![Value::from("u2")]);
    }

    #[test]
    fn test_update_removes_empty_attributes() {
        let dir = MemoryDirectory::new();
        dir.insert("User", "u1", None, attrs(&[("mail", "a@x".into())]));
        let mut change = Record::new();
        change.insert("mail".into(), vec![]);
        dir.update("u1", &change, &Params::new()).unwrap();
        assert!(!dir.get("u1").unwrap().contains_key("mail"));
    }

    #[test]
    fn test_next_id_skips_stored_ids() {
        let dir = MemoryDirectory::new();
        dir.insert("User", "u1", None, attrs(&[("uidNumber", Value::Int(1005))]));
        assert_eq!(dir.get_next_id("uidNumber").unwrap(), 1006);
        assert_eq!(dir.get_next_id("uidNumber").unwrap(), 1007);
        assert_eq!(dir.get_next_id("gidNumber").unwrap(), DEFAULT_ID_BASE);
    }

    #[test]
    fn test_is_uniq() {
        let dir = MemoryDirectory::new();
        dir.insert("User", "u1", None, attrs(&[("uid", "a".into())]));
        assert!(!dir.is_uniq("uid", &"a".into(), None).unwrap());
        assert!(dir.is_uniq("uid", &"a".into(), Some("Group")).unwrap());
    }

    #[test]
    fn test_extend_and_retract() {
        let dir = MemoryDirectory::new();
        dir.insert("User", "u1", None, Record::new());
        dir.extend("u1", "PosixUser", &attrs(&[("uidNumber", Value::Int(1))]), &Params::new())
            .unwrap();
        assert!(dir.open("PosixUser", "u1").is_ok());
        dir.retract("u1", "PosixUser", &["uidNumber"], &Params::new())
            .unwrap();
        assert!(dir.open("PosixUser", "u1").is_err());
        assert!(!dir.get("u1").unwrap().contains_key("uidNumber"));
    }

    #[test]
    fn test_proxy_commit_replaces_attributes() {
        let dir = MemoryDirectory::new();
        dir.insert("Group", "g1", None, attrs(&[("memberUid", "a".into())]));
        let mut handle = dir.open("Group", "g1").unwrap();
        handle.values_mut("memberUid").push("b".into());
        dir.commit(handle).unwrap();
        assert_eq!(dir.get("g1").unwrap()["memberUid"].len(), 2);
    }

    #[test]
    fn test_acl_grants() {
        let acl = MemoryAcl::new();
        acl.grant("admin", "User.uid", "rw");
        assert!(acl.check("admin", "User.uid", "w", None));
        assert!(!acl.check("admin", "User.uid", "d", None));
        assert!(!acl.role_exists("editors"));
        acl.add_role("editors");
        assert!(acl.role_exists("editors"));
    }

    #[test]
    fn test_artifacts() {
        let store = MemoryArtifacts::new();
        store.put("a", b"1").unwrap();
        assert!(store.exists("a").unwrap());
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
    }
}
