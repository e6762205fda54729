//! Relation resolver
//!
//! Virtual attributes have no storage of their own. Their values are derived
//! from other objects on load and pushed back to those objects on save.
//!
//! A mapping `"PosixGroup:cn,memberUid=uid"` on a user's `groupMembership`
//! reads as: the user is a member of every `PosixGroup` whose `memberUid`
//! holds the user's `uid`, and the attribute lists those groups' `cn`.
//!
//! # Import deferral
//!
//! While a bulk import runs, foreign objects may not exist yet. Loads then
//! skip resolution and record the object for a fix-up pass once
//! [`ImportState::finish`] is called.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use attrflow_core::search::{EXTENSIONS, TYPE, UUID};
use attrflow_core::{Collaborators, Error, ObjectRef, Query, Result, Value};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Foreign type wildcard
pub const ANY_TYPE: &str = "*";

// =============================================================================
// Mapping
// =============================================================================

/// Parsed relation configuration of one virtual attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMapping {
    /// Virtual attribute on the local object
    pub target_attribute: String,
    /// Foreign object type, `None` for the `*` wildcard
    pub foreign_type: Option<String>,
    /// Foreign attribute projected into the virtual attribute
    pub foreign_attribute: String,
    /// Foreign attribute listing local match values
    pub foreign_match_attribute: String,
    /// Local attribute whose value the foreign objects list
    pub local_match_attribute: String,
}

impl RelationMapping {
    /// Parse `"Type:foreignAttr,matchAttr=localAttr"` for `target_attribute`
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for malformed strings.
    pub fn parse(target_attribute: &str, raw: &str) -> Result<Self> {
        let malformed = || {
            Error::schema(format!(
                "relation of '{}' must look like 'Type:foreignAttr,matchAttr=localAttr', got {:?}",
                target_attribute, raw
            ))
        };
        let (foreign_type, rest) = raw.split_once(':').ok_or_else(malformed)?;
        let (foreign_attribute, matching) = rest.split_once(',').ok_or_else(malformed)?;
        let (foreign_match, local_match) = matching.split_once('=').ok_or_else(malformed)?;

        let parts = [foreign_type, foreign_attribute, foreign_match, local_match].map(str::trim);
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed());
        }
        let [foreign_type, foreign_attribute, foreign_match, local_match] = parts;
        Ok(RelationMapping {
            target_attribute: target_attribute.to_string(),
            foreign_type: (foreign_type != ANY_TYPE).then(|| foreign_type.to_string()),
            foreign_attribute: foreign_attribute.to_string(),
            foreign_match_attribute: foreign_match.to_string(),
            local_match_attribute: local_match.to_string(),
        })
    }

    /// Restrict a query to the foreign type, matching base type or extension
    fn scoped(&self, query: Query) -> Query {
        match &self.foreign_type {
            None => query,
            Some(t) => query.or(
                Query::new().eq(TYPE, t.as_str()),
                Query::new().eq(EXTENSIONS, t.as_str()),
            ),
        }
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Set difference of two value lists: `(old - new, new - old)`
///
/// Input order is kept; duplicates are reported once.
pub fn diff(old: &[Value], new: &[Value]) -> (Vec<Value>, Vec<Value>) {
    fn minus(a: &[Value], b: &[Value]) -> Vec<Value> {
        let mut out: Vec<Value> = Vec::new();
        for v in a {
            if !b.contains(v) && !out.contains(v) {
                out.push(v.clone());
            }
        }
        out
    }
    (minus(old, new), minus(new, old))
}

// =============================================================================
// Import state
// =============================================================================

/// Bulk-import flag and the objects whose relations were skipped
#[derive(Debug, Default)]
pub struct ImportState {
    importing: AtomicBool,
    pending: Mutex<Vec<String>>,
}

impl ImportState {
    /// Not importing, nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter import mode
    pub fn begin(&self) {
        self.importing.store(true, Ordering::SeqCst);
        debug!("bulk import started, deferring relation resolution");
    }

    /// Whether an import is running
    pub fn is_importing(&self) -> bool {
        self.importing.load(Ordering::SeqCst)
    }

    /// Record an object for the fix-up pass
    pub fn defer(&self, uuid: &str) {
        let mut pending = self.pending.lock();
        if !pending.iter().any(|p| p == uuid) {
            pending.push(uuid.to_string());
        }
    }

    /// Leave import mode and hand back the deferred objects
    pub fn finish(&self) -> Vec<String> {
        self.importing.store(false, Ordering::SeqCst);
        let pending = std::mem::take(&mut *self.pending.lock());
        debug!(pending = pending.len(), "bulk import finished");
        pending
    }

    /// Objects waiting for resolution
    pub fn pending(&self) -> Vec<String> {
        self.pending.lock().clone()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// One foreign object edit of a planned update
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignEdit {
    /// Foreign object uuid
    pub uuid: String,
    /// Type to open the foreign object as
    pub object_type: String,
    /// Add (`true`) or remove the local match value
    pub add: bool,
    /// Virtual attribute value that selected this object
    pub value: Value,
}

/// Fully resolved update of one virtual attribute
///
/// Building a plan touches no foreign object; [`RelationResolver::apply`]
/// performs the edits.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationPlan {
    /// Mapping the plan was built for
    pub mapping: Arc<RelationMapping>,
    /// Local match value to add to or remove from foreign objects
    pub local_value: Value,
    /// Edits in resolution order, removals first
    pub edits: Vec<ForeignEdit>,
}

impl RelationPlan {
    /// Nothing to change
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Loads and updates virtual attributes
#[derive(Debug, Default)]
pub struct RelationResolver {
    mappings: DashMap<(String, String), Arc<RelationMapping>>,
    import: ImportState,
}

impl RelationResolver {
    /// Empty cache, not importing
    pub fn new() -> Self {
        Self::default()
    }

    /// Import state shared by every load
    pub fn import(&self) -> &ImportState {
        &self.import
    }

    /// Mapping of `object_type.attribute`, parsed once and cached
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for malformed strings.
    pub fn mapping(&self, object_type: &str, attribute: &str, raw: &str) -> Result<Arc<RelationMapping>> {
        let key = (object_type.to_string(), attribute.to_string());
        if let Some(cached) = self.mappings.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }
        let parsed = Arc::new(RelationMapping::parse(attribute, raw)?);
        Ok(Arc::clone(self.mappings.entry(key).or_insert(parsed).value()))
    }

    /// Number of cached mappings
    pub fn cached(&self) -> usize {
        self.mappings.len()
    }

    /// Values of a virtual attribute
    ///
    /// Returns `None` when resolution was deferred by a running import.
    ///
    /// # Errors
    ///
    /// Search collaborator failures.
    pub fn load(&self, object: &ObjectRef, mapping: &RelationMapping, env: &Collaborators) -> Result<Option<Vec<Value>>> {
        if self.import.is_importing() {
            trace!(uuid = %object.uuid, attribute = %mapping.target_attribute, "deferred relation load");
            self.import.defer(&object.uuid);
            return Ok(None);
        }

        let own = env.search.search(
            &Query::new().eq(UUID, object.uuid.as_str()),
            &[mapping.local_match_attribute.as_str()],
        )?;
        let local_value = match own
            .first()
            .and_then(|r| r.get(&mapping.local_match_attribute))
            .and_then(|v| v.first())
        {
            Some(v) => v.clone(),
            None => return Ok(Some(Vec::new())),
        };
        self.load_for(&local_value, mapping, env).map(Some)
    }

    /// Values of a virtual attribute for a known local match value
    ///
    /// # Errors
    ///
    /// Search collaborator failures.
    pub fn load_for(&self, local_value: &Value, mapping: &RelationMapping, env: &Collaborators) -> Result<Vec<Value>> {
        let query = mapping.scoped(
            Query::new().eq(mapping.foreign_match_attribute.as_str(), local_value.clone()),
        );
        let hits = env
            .search
            .search(&query, &[mapping.foreign_attribute.as_str()])?;
        let mut values: Vec<Value> = Vec::new();
        for value in hits
            .iter()
            .filter_map(|hit| hit.get(&mapping.foreign_attribute))
            .flatten()
        {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        trace!(attribute = %mapping.target_attribute, count = values.len(), "resolved relation");
        Ok(values)
    }

    /// Resolve an update without touching any foreign object
    ///
    /// # Errors
    ///
    /// [`Error::RelationNotFound`] or [`Error::RelationAmbiguity`] when a
    /// value does not select exactly one foreign object.
    pub fn plan(
        &self,
        mapping: Arc<RelationMapping>,
        local_value: Value,
        old: &[Value],
        new: &[Value],
        env: &Collaborators,
    ) -> Result<RelationPlan> {
        let (removed, added) = diff(old, new);
        let mut edits = Vec::with_capacity(removed.len() + added.len());
        for (values, add) in [(removed, false), (added, true)] {
            for value in values {
                let (uuid, object_type) = self.resolve_one(&mapping, &value, env)?;
                edits.push(ForeignEdit {
                    uuid,
                    object_type,
                    add,
                    value,
                });
            }
        }
        debug!(
            attribute = %mapping.target_attribute,
            edits = edits.len(),
            "planned relation update"
        );
        Ok(RelationPlan {
            mapping,
            local_value,
            edits,
        })
    }

    fn resolve_one(&self, mapping: &RelationMapping, value: &Value, env: &Collaborators) -> Result<(String, String)> {
        let query = mapping.scoped(Query::new().eq(mapping.foreign_attribute.as_str(), value.clone()));
        let hits = env.search.search(&query, &[UUID, TYPE])?;
        let rendered = || value.as_text().unwrap_or_default();
        match hits.as_slice() {
            [] => Err(Error::RelationNotFound {
                attribute: mapping.target_attribute.clone(),
                value: rendered(),
            }),
            [hit] => {
                let text = |key: &str| {
                    hit.get(key)
                        .and_then(|v| v.first())
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };
                let uuid = text(UUID).ok_or_else(|| Error::backend("search hit without uuid"))?;
                let object_type = match &mapping.foreign_type {
                    Some(t) => t.clone(),
                    None => text(TYPE).ok_or_else(|| Error::backend("search hit without type"))?,
                };
                Ok((uuid, object_type))
            }
            many => Err(Error::RelationAmbiguity {
                attribute: mapping.target_attribute.clone(),
                value: rendered(),
                matches: many.len(),
            }),
        }
    }

    /// Perform a planned update
    ///
    /// Each touched foreign object is opened and committed once. Removing an
    /// absent value and adding a present one are no-ops. Returns the number
    /// of committed objects.
    ///
    /// # Errors
    ///
    /// Object proxy failures. Edits already committed stay committed.
    pub fn apply(&self, plan: &RelationPlan, env: &Collaborators) -> Result<usize> {
        let mut grouped: BTreeMap<(String, String), Vec<bool>> = BTreeMap::new();
        for edit in &plan.edits {
            grouped
                .entry((edit.uuid.clone(), edit.object_type.clone()))
                .or_default()
                .push(edit.add);
        }

        let attribute = plan.mapping.foreign_match_attribute.as_str();
        let mut committed = 0;
        for ((uuid, object_type), ops) in grouped {
            let mut handle = env.proxy.open(&object_type, &uuid)?;
            let members = handle.values_mut(attribute);
            for add in ops {
                if add {
                    if !members.contains(&plan.local_value) {
                        members.push(plan.local_value.clone());
                    }
                } else {
                    members.retain(|m| m != &plan.local_value);
                }
            }
            env.proxy.commit(handle)?;
            committed += 1;
        }
        if committed > 0 {
            debug!(attribute = %plan.mapping.target_attribute, committed, "applied relation update");
        }
        Ok(committed)
    }
}

/// Distinct foreign objects a plan touches
pub fn touched(plan: &RelationPlan) -> BTreeSet<&str> {
    plan.edits.iter().map(|e| e.uuid.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrflow_core::{MemoryDirectory, Record};

    const MAPPING: &str = "PosixGroup:cn,memberUid=uid";

    fn group(directory: &MemoryDirectory, uuid: &str, cn: &str, members: &[&str]) {
        let mut record = Record::new();
        record.insert("cn".into(), vec![Value::from(cn)]);
        record.insert(
            "memberUid".into(),
            members.iter().map(|m| Value::from(*m)).collect(),
        );
        directory.insert("PosixGroup", uuid, None, record);
    }

    fn setup() -> (Arc<MemoryDirectory>, Collaborators, ObjectRef) {
        let directory = Arc::new(MemoryDirectory::new());
        let mut user = Record::new();
        user.insert("uid".into(), vec![Value::from("jdoe")]);
        directory.insert("User", "u-1", None, user);
        group(&directory, "g-a", "a", &["jdoe"]);
        group(&directory, "g-b", "b", &["jdoe", "other"]);
        group(&directory, "g-c", "c", &["other"]);
        let env = Collaborators::in_memory("mem", directory.clone());
        (directory, env, ObjectRef::new("User", "u-1"))
    }

    fn members(directory: &MemoryDirectory, uuid: &str) -> Vec<Value> {
        directory
            .get(uuid)
            .and_then(|r| r.get("memberUid").cloned())
            .unwrap_or_default()
    }

    fn strings(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    #[test]
    fn test_parse_mapping() {
        let mapping = RelationMapping::parse("groupMembership", MAPPING).unwrap();
        assert_eq!(mapping.foreign_type.as_deref(), Some("PosixGroup"));
        assert_eq!(mapping.foreign_attribute, "cn");
        assert_eq!(mapping.foreign_match_attribute, "memberUid");
        assert_eq!(mapping.local_match_attribute, "uid");

        let wildcard = RelationMapping::parse("x", "*:cn,member=dn").unwrap();
        assert!(wildcard.foreign_type.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["PosixGroup", "PosixGroup:cn", "PosixGroup:cn,memberUid", ":cn,m=u", "T:cn,m= "] {
            assert!(
                matches!(RelationMapping::parse("x", raw), Err(Error::SchemaConfiguration(_))),
                "{raw:?} accepted"
            );
        }
    }

    #[test]
    fn test_diff_is_set_difference() {
        let (removed, added) = diff(&strings(&["a", "b"]), &strings(&["b", "c"]));
        assert_eq!(removed, strings(&["a"]));
        assert_eq!(added, strings(&["c"]));

        let (removed, added) = diff(&strings(&["a", "a"]), &strings(&["b", "b", "a"]));
        assert!(removed.is_empty());
        assert_eq!(added, strings(&["b"]));
    }

    #[test]
    fn test_mapping_cache() {
        let resolver = RelationResolver::new();
        let first = resolver.mapping("User", "groupMembership", MAPPING).unwrap();
        let second = resolver.mapping("User", "groupMembership", "ignored:once,cached=here").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_load_projects_foreign_attribute() {
        let (_directory, env, user) = setup();
        let resolver = RelationResolver::new();
        let mapping = RelationMapping::parse("groupMembership", MAPPING).unwrap();
        let values = resolver.load(&user, &mapping, &env).unwrap().unwrap();
        assert_eq!(values, strings(&["a", "b"]));
    }

    #[test]
    fn test_load_without_local_value_is_empty() {
        let (directory, env, _) = setup();
        directory.insert("User", "u-2", None, Record::new());
        let resolver = RelationResolver::new();
        let mapping = RelationMapping::parse("groupMembership", MAPPING).unwrap();
        let values = resolver
            .load(&ObjectRef::new("User", "u-2"), &mapping, &env)
            .unwrap();
        assert_eq!(values, Some(Vec::new()));
    }

    #[test]
    fn test_import_defers_and_hands_back_pending() {
        let (_directory, env, user) = setup();
        let resolver = RelationResolver::new();
        let mapping = RelationMapping::parse("groupMembership", MAPPING).unwrap();

        resolver.import().begin();
        assert_eq!(resolver.load(&user, &mapping, &env).unwrap(), None);
        assert_eq!(resolver.load(&user, &mapping, &env).unwrap(), None);
        assert_eq!(resolver.import().pending(), vec!["u-1".to_string()]);

        assert_eq!(resolver.import().finish(), vec!["u-1".to_string()]);
        assert!(!resolver.import().is_importing());
        assert!(resolver.import().pending().is_empty());
        assert!(resolver.load(&user, &mapping, &env).unwrap().is_some());
    }

    #[test]
    fn test_update_moves_membership() {
        let (directory, env, _) = setup();
        let resolver = RelationResolver::new();
        let mapping = Arc::new(RelationMapping::parse("groupMembership", MAPPING).unwrap());
        let plan = resolver
            .plan(
                mapping,
                Value::from("jdoe"),
                &strings(&["a", "b"]),
                &strings(&["b", "c"]),
                &env,
            )
            .unwrap();
        assert_eq!(touched(&plan), ["g-a", "g-c"].into_iter().collect());
        assert_eq!(resolver.apply(&plan, &env).unwrap(), 2);

        assert!(members(&directory, "g-a").is_empty());
        assert_eq!(members(&directory, "g-b"), strings(&["jdoe", "other"]));
        assert_eq!(members(&directory, "g-c"), strings(&["other", "jdoe"]));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (directory, env, _) = setup();
        let resolver = RelationResolver::new();
        let mapping = Arc::new(RelationMapping::parse("groupMembership", MAPPING).unwrap());
        let plan = resolver
            .plan(mapping, Value::from("jdoe"), &[], &strings(&["b"]), &env)
            .unwrap();
        resolver.apply(&plan, &env).unwrap();
        resolver.apply(&plan, &env).unwrap();
        assert_eq!(members(&directory, "g-b"), strings(&["jdoe", "other"]));
    }

    #[test]
    fn test_missing_target_aborts_before_mutation() {
        let (directory, env, _) = setup();
        let resolver = RelationResolver::new();
        let mapping = Arc::new(RelationMapping::parse("groupMembership", MAPPING).unwrap());
        let result = resolver.plan(
            mapping,
            Value::from("jdoe"),
            &strings(&["a"]),
            &strings(&["nope"]),
            &env,
        );
        assert!(matches!(result, Err(Error::RelationNotFound { .. })));
        assert_eq!(members(&directory, "g-a"), strings(&["jdoe"]));
    }

    #[test]
    fn test_ambiguous_target() {
        let (directory, env, _) = setup();
        group(&directory, "g-c2", "c", &[]);
        let resolver = RelationResolver::new();
        let mapping = Arc::new(RelationMapping::parse("groupMembership", MAPPING).unwrap());
        match resolver.plan(mapping, Value::from("jdoe"), &[], &strings(&["c"]), &env) {
            Err(Error::RelationAmbiguity { matches, .. }) => assert_eq!(matches, 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_wildcard_uses_stored_type() {
        let (directory, env, _) = setup();
        let resolver = RelationResolver::new();
        let mapping = Arc::new(RelationMapping::parse("groupMembership", "*:cn,memberUid=uid").unwrap());
        let plan = resolver
            .plan(mapping, Value::from("jdoe"), &[], &strings(&["c"]), &env)
            .unwrap();
        assert_eq!(plan.edits[0].object_type, "PosixGroup");
        resolver.apply(&plan, &env).unwrap();
        assert_eq!(members(&directory, "g-c"), strings(&["other", "jdoe"]));
    }
}
