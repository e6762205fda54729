//! Object load and save pipeline
//!
//! ```text
//! load:  backends ─▶ raw table ─▶ in-programs ─▶ type conversion ─▶ Object
//!        relations ─▶ virtual attributes ──────────────────────────┘
//!
//! save:  Object ─▶ ACL ─▶ change detection ─▶ validators
//!        ─▶ out-programs (on a copy) ─▶ type conversion ─▶ relation plans
//!        ─▶ backend writes ─▶ relation edits ─▶ commit
//! ```
//!
//! Attribute pipelines are isolated: a failing filter or validator rejects
//! its attribute, the others still run, and the save reports every failure
//! together without writing anything.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use attrflow_core::search::{DN, TYPE, UUID};
use attrflow_core::{
    AttributeValue, Collaborators, Error, ErrorRecord, ObjectRef, Params, Query, Record, Result,
    Value, ValueTable,
};
use attrflow_executor::Executor;
use attrflow_filters::FilterContext;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, CONFIG_FILE_NAME};
use crate::error::{AttributeError, EngineError, EngineResult};
use crate::registries::Registries;
use crate::relation::{RelationPlan, RelationResolver};
use crate::schema::{read_schema_dir, CompiledAttribute, CompiledSchema, ObjectSchema};

// =============================================================================
// Object
// =============================================================================

/// One loaded or new object and its working attribute table
#[derive(Debug, Clone)]
pub struct Object {
    reference: ObjectRef,
    schema: Arc<CompiledSchema>,
    table: ValueTable,
    deferred: bool,
}

impl Object {
    /// Identity
    pub fn reference(&self) -> &ObjectRef {
        &self.reference
    }

    /// Uuid, empty until first saved
    pub fn uuid(&self) -> &str {
        &self.reference.uuid
    }

    /// Object type name
    pub fn object_type(&self) -> &str {
        &self.reference.object_type
    }

    /// Not stored yet
    pub fn is_new(&self) -> bool {
        self.reference.uuid.is_empty()
    }

    /// Relation attributes were skipped by a running import
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Compiled schema of the object's type
    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Application values of an attribute
    ///
    /// # Errors
    ///
    /// [`Error::UnknownAttribute`] for undeclared names.
    pub fn get(&self, attribute: &str) -> Result<&[Value]> {
        Ok(&self.table.require(attribute)?.current)
    }

    /// Working table
    pub fn table(&self) -> &ValueTable {
        &self.table
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Loads, validates and saves objects described by compiled schemas
pub struct ObjectEngine {
    config: EngineConfig,
    registries: Arc<Registries>,
    env: Collaborators,
    schemas: RwLock<BTreeMap<String, Arc<CompiledSchema>>>,
    relations: RelationResolver,
}

impl std::fmt::Debug for ObjectEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectEngine")
            .field("config", &self.config)
            .field("schemas", &self.schemas.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ObjectEngine {
    /// Engine without schemas
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the configuration does not validate.
    pub fn new(config: EngineConfig, registries: Arc<Registries>, env: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(ObjectEngine {
            config,
            registries,
            env,
            schemas: RwLock::new(BTreeMap::new()),
            relations: RelationResolver::new(),
        })
    }

    /// Engine configured from `attrflow.toml` in `base`
    ///
    /// Writes the default configuration when none exists, then registers
    /// every schema of the configured schema directory if it exists.
    ///
    /// # Errors
    ///
    /// Configuration and schema errors.
    pub fn open(base: &Path, registries: Arc<Registries>, env: Collaborators) -> Result<Self> {
        let config_path = base.join(CONFIG_FILE_NAME);
        EngineConfig::write_default_if_missing(&config_path)?;
        let config = EngineConfig::from_file(&config_path)?;
        let schema_dir = config.schema_dir_from(base);
        let engine = Self::new(config, registries, env)?;
        if schema_dir.is_dir() {
            engine.load_schema_dir(&schema_dir)?;
        } else {
            debug!(dir = %schema_dir.display(), "no schema directory");
        }
        Ok(engine)
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registries schemas are compiled against
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Relation resolver and its import state
    pub fn relations(&self) -> &RelationResolver {
        &self.relations
    }

    /// Compile and register an object type, replacing any previous version
    ///
    /// # Errors
    ///
    /// Compilation errors, and [`Error::SchemaConfiguration`] when an
    /// attribute names a backend that is not registered.
    pub fn register(&self, schema: &ObjectSchema) -> Result<Arc<CompiledSchema>> {
        let compiled = CompiledSchema::compile(
            schema,
            &self.registries,
            &self.relations,
            &self.config.default_backend,
        )?;
        for backend in compiled.backends() {
            self.env
                .backend(backend)
                .map_err(|e| Error::schema(format!("{}: {}", schema.name, e)))?;
        }
        let compiled = Arc::new(compiled);
        self.schemas
            .write()
            .insert(schema.name.clone(), Arc::clone(&compiled));
        info!(object_type = %schema.name, "registered object type");
        Ok(compiled)
    }

    /// Register every schema file of a directory
    ///
    /// # Errors
    ///
    /// The first file or compilation error.
    pub fn load_schema_dir(&self, dir: &Path) -> Result<usize> {
        let schemas = read_schema_dir(dir)?;
        for schema in &schemas {
            self.register(schema)?;
        }
        Ok(schemas.len())
    }

    /// Compiled schema of an object type
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for unregistered types.
    pub fn schema(&self, object_type: &str) -> Result<Arc<CompiledSchema>> {
        self.schemas
            .read()
            .get(object_type)
            .cloned()
            .ok_or_else(|| Error::schema(format!("unknown object type '{}'", object_type)))
    }

    /// Registered object type names
    pub fn object_types(&self) -> Vec<String> {
        self.schemas.read().keys().cloned().collect()
    }

    fn executor<'a>(&'a self, reference: &'a ObjectRef) -> Executor<'a> {
        Executor::new(FilterContext::new(
            reference,
            &self.env,
            &self.registries.types,
            &self.config.filters,
        ))
    }

    // =========================================================================
    // Create / load
    // =========================================================================

    /// New, unsaved object carrying the declared defaults
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for unregistered types.
    pub fn create(&self, object_type: &str) -> Result<Object> {
        let schema = self.schema(object_type)?;
        let mut table = ValueTable::new();
        for attr in schema.attributes() {
            let mut slot = AttributeValue::new(attr.value_type())
                .with_values(attr.defaults.clone())
                .with_backends(attr.backends.iter().cloned());
            slot.skip_save = attr.definition.skip_save;
            table.insert(attr.name(), slot);
        }
        Ok(Object {
            reference: ObjectRef::new(object_type, ""),
            schema,
            table,
            deferred: false,
        })
    }

    /// Load an object
    ///
    /// # Errors
    ///
    /// Backend failures, and [`EngineError::Attributes`] when in-programs or
    /// conversions fail for some attributes.
    pub fn load(&self, object_type: &str, uuid: &str) -> EngineResult<Object> {
        let schema = self.schema(object_type)?;
        let mut reference = ObjectRef::new(object_type, uuid);

        let mut by_backend: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for attr in schema.attributes().filter(|a| !a.is_virtual()) {
            let backend = attr.backends.first().map_or(schema.backend(), String::as_str);
            by_backend.entry(backend).or_default().push(attr.name());
        }
        by_backend.entry(schema.backend()).or_default();

        let mut record = Record::new();
        for (backend, mut names) in by_backend {
            names.push(DN);
            record.extend(self.env.backend(backend)?.load(uuid, &names)?);
        }
        reference.dn = record
            .get(DN)
            .and_then(|v| v.first())
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut table = ValueTable::new();
        let mut deferred = false;
        for attr in schema.attributes() {
            let values = match &attr.relation {
                Some(mapping) => match self.relations.load(&reference, mapping, &self.env)? {
                    Some(values) => values,
                    None => {
                        deferred = true;
                        Vec::new()
                    }
                },
                None => record.remove(attr.name()).unwrap_or_default(),
            };
            let backend_type = if attr.is_virtual() {
                attr.value_type()
            } else {
                attr.backend_type.as_str()
            };
            let mut slot = AttributeValue::loaded(values, attr.value_type(), backend_type)
                .with_backends(attr.backends.iter().cloned());
            slot.skip_save = attr.definition.skip_save;
            table.insert(attr.name(), slot);
        }

        let mut errors = Vec::new();
        let executor = self.executor(&reference);
        for attr in schema.attributes() {
            if let Some(program) = &attr.in_program {
                if let Err(e) = executor.execute(program, attr.name(), &mut table) {
                    errors.push(AttributeError::new(attr.name(), e, table.values(attr.name())));
                }
            }
        }
        for attr in schema.attributes() {
            if let Err(e) = self.to_application(attr, &mut table) {
                errors.push(AttributeError::new(attr.name(), e, table.values(attr.name())));
            }
        }
        if !errors.is_empty() {
            warn!(uuid, object_type, failed = errors.len(), "object loaded with errors");
            return Err(EngineError::Attributes(errors));
        }

        let names: Vec<String> = table.names().map(str::to_string).collect();
        for name in names {
            if let Some(slot) = table.get_mut(&name) {
                slot.commit();
            }
        }
        debug!(uuid, object_type, deferred, "loaded object");
        Ok(Object {
            reference,
            schema,
            table,
            deferred,
        })
    }

    /// Convert a loaded slot from its storage type into its application type
    fn to_application(&self, attr: &CompiledAttribute, table: &mut ValueTable) -> Result<()> {
        let slot = table.require_mut(attr.name())?;
        let converted = self.registries.types.convert(
            &slot.backend_type,
            &slot.value_type,
            &slot.current,
            attr.name(),
        )?;
        slot.current = converted;
        slot.backend_type = attr.backend_type.clone();
        Ok(())
    }

    // =========================================================================
    // Edit / validate
    // =========================================================================

    /// Replace the values of an attribute
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownAttribute`] for undeclared names
    /// - [`Error::UnsupportedOperation`] for read-only attributes
    /// - [`Error::Validation`] for several values on a single-valued attribute
    /// - [`Error::TypeConversion`] for values the type rejects
    pub fn set(&self, object: &mut Object, attribute: &str, values: Vec<Value>) -> Result<()> {
        let attr = object.schema.require(attribute)?;
        if attr.definition.readonly {
            return Err(Error::UnsupportedOperation(format!(
                "attribute '{}' is read-only",
                attribute
            )));
        }
        if !attr.definition.multivalue && values.len() > 1 {
            return Err(Error::Validation {
                attribute: attribute.to_string(),
                records: vec![ErrorRecord::new(1, "attribute {attribute} takes a single value")
                    .with("attribute", attribute)],
            });
        }
        let handle = self.registries.types.require(attr.value_type())?;
        let values = handle.fixup(values)?;
        if !handle.is_valid_value(&values) {
            let rendered = values
                .iter()
                .map(|v| v.as_text().unwrap_or_else(|| v.type_name().to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::conversion(attr.value_type(), rendered, "invalid value for type"));
        }
        object.table.require_mut(attribute)?.current = values;
        Ok(())
    }

    fn is_changed(&self, object: &Object, attr: &CompiledAttribute) -> Result<bool> {
        let slot = object.table.require(attr.name())?;
        Ok(!self
            .registries
            .types
            .values_match(attr.value_type(), &slot.current, &slot.original)?)
    }

    /// Names of attributes whose values differ from the loaded state
    ///
    /// Attributes depending on a changed attribute count as changed too.
    /// The result follows declaration order.
    ///
    /// # Errors
    ///
    /// Type lookup failures.
    pub fn changed(&self, object: &Object) -> Result<Vec<String>> {
        let mut marked = Vec::new();
        for attr in object.schema.attributes() {
            marked.push(self.is_changed(object, attr)?);
        }
        loop {
            let mut grew = false;
            for (position, attr) in object.schema.attributes().enumerate() {
                if marked[position] {
                    continue;
                }
                let triggered = attr.definition.depends_on.iter().any(|dep| {
                    object
                        .schema
                        .attributes()
                        .position(|a| a.name() == dep)
                        .is_some_and(|i| marked[i])
                });
                if triggered {
                    marked[position] = true;
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        Ok(object
            .schema
            .attributes()
            .zip(marked)
            .filter(|(_, changed)| *changed)
            .map(|(attr, _)| attr.name().to_string())
            .collect())
    }

    /// Check mandatory attributes and run validators of changed attributes
    ///
    /// # Errors
    ///
    /// [`EngineError::Attributes`] listing every rejected attribute.
    pub fn validate(&self, object: &Object) -> EngineResult<()> {
        let changed = self.changed(object)?;
        let errors = self.check(object, &changed);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Attributes(errors))
        }
    }

    fn check(&self, object: &Object, changed: &[String]) -> Vec<AttributeError> {
        let executor = self.executor(&object.reference);
        let mut errors = Vec::new();
        for attr in object.schema.attributes() {
            let values = object.table.values(attr.name());
            if attr.definition.mandatory && values.is_empty() {
                errors.push(AttributeError::new(
                    attr.name(),
                    Error::Validation {
                        attribute: attr.name().to_string(),
                        records: vec![ErrorRecord::new(0, "attribute {attribute} is mandatory")
                            .with("attribute", attr.name())],
                    },
                    values,
                ));
                continue;
            }
            let program = match &attr.validator {
                Some(program) if changed.iter().any(|c| c == attr.name()) => program,
                _ => continue,
            };
            match executor.evaluate(program, attr.name(), values, &object.table) {
                Ok(verdict) if verdict.ok => {}
                Ok(verdict) => errors.push(AttributeError::new(
                    attr.name(),
                    Error::Validation {
                        attribute: attr.name().to_string(),
                        records: verdict.errors,
                    },
                    values,
                )),
                Err(e) => errors.push(AttributeError::new(attr.name(), e, values)),
            }
        }
        errors
    }

    // =========================================================================
    // Save / remove
    // =========================================================================

    fn authorize(&self, object: &Object, user: Option<&str>, permission: &str) -> Result<()> {
        let user = match user {
            Some(user) if self.config.check_acl => user,
            _ => return Ok(()),
        };
        let topic = self.config.acl_topic(object.object_type());
        if self
            .env
            .acl
            .check(user, &topic, permission, object.reference.dn.as_deref())
        {
            Ok(())
        } else {
            Err(Error::PermissionDenied {
                user: user.to_string(),
                topic,
                permission: permission.to_string(),
            })
        }
    }

    /// Persist an object's changes and return its uuid
    ///
    /// Nothing is written unless every changed attribute passes validation,
    /// its out-program and conversion, and every relation update resolves.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] when `user` may not write the object
    /// - [`EngineError::Attributes`] listing every rejected attribute
    /// - backend failures
    pub fn save(&self, object: &mut Object, user: Option<&str>) -> EngineResult<String> {
        let permission = if object.is_new() { "c" } else { "w" };
        self.authorize(object, user, permission)?;

        let schema = Arc::clone(&object.schema);
        let changed = self.changed(object)?;
        if changed.is_empty() && !object.is_new() {
            debug!(uuid = %object.uuid(), "nothing to save");
            return Ok(object.uuid().to_string());
        }

        let mut errors = self.check(object, &changed);
        if !errors.is_empty() {
            return Err(EngineError::Attributes(errors));
        }

        // Out-programs run on a copy so the object keeps its application values.
        let mut out = object.table.clone();
        let names: Vec<String> = out.names().map(str::to_string).collect();
        for name in &names {
            if let Some(slot) = out.get_mut(name) {
                slot.backend_type = slot.value_type.clone();
            }
        }
        let executor = self.executor(&object.reference);
        let mut write_keys: Vec<String> = Vec::new();
        for name in &changed {
            let attr = schema.require(name)?;
            if attr.is_virtual() {
                continue;
            }
            let key = match &attr.out_program {
                Some(program) => match executor.execute(program, name, &mut out) {
                    Ok(key) => key,
                    Err(e) => {
                        errors.push(AttributeError::new(name.as_str(), e, out.values(name)));
                        continue;
                    }
                },
                None => name.clone(),
            };
            if !write_keys.contains(&key) {
                write_keys.push(key);
            }
        }

        let mut records: BTreeMap<String, Record> = BTreeMap::new();
        for key in &write_keys {
            match self.to_storage(&schema, key, &out) {
                Ok(Some((backend, values))) => {
                    records.entry(backend).or_default().insert(key.clone(), values);
                }
                Ok(None) => {}
                Err(e) => errors.push(AttributeError::new(key.as_str(), e, out.values(key))),
            }
        }

        let mut plans: Vec<RelationPlan> = Vec::new();
        for name in &changed {
            let attr = schema.require(name)?;
            let mapping = match &attr.relation {
                Some(mapping) => Arc::clone(mapping),
                None => continue,
            };
            let slot = object.table.require(name)?;
            let local_value = match object.table.values(&mapping.local_match_attribute).first() {
                Some(v) => v.clone(),
                None => {
                    errors.push(AttributeError::new(
                        name.as_str(),
                        Error::Validation {
                            attribute: name.clone(),
                            records: vec![ErrorRecord::new(0, "{attribute} requires a value of {match}")
                                .with("attribute", name)
                                .with("match", &mapping.local_match_attribute)],
                        },
                        &slot.current,
                    ));
                    continue;
                }
            };
            match self
                .relations
                .plan(mapping, local_value, &slot.original, &slot.current, &self.env)
            {
                Ok(plan) => plans.push(plan),
                Err(e) => errors.push(AttributeError::new(name.as_str(), e, &slot.current)),
            }
        }

        if !errors.is_empty() {
            warn!(
                uuid = %object.uuid(),
                object_type = %object.object_type(),
                rejected = errors.len(),
                "save rejected"
            );
            return Err(EngineError::Attributes(errors));
        }

        let artifacts = out.take_artifacts();
        artifacts.store(&self.env)?;

        let params = Params::new();
        if object.is_new() {
            let primary = records.remove(schema.backend()).unwrap_or_default();
            let uuid = self
                .env
                .backend(schema.backend())?
                .create(object.object_type(), &primary, &params)?;
            object.reference.uuid = uuid;
        }
        for (backend, record) in &records {
            self.env
                .backend(backend)?
                .update(object.uuid(), record, &params)?;
        }

        let mut committed = 0;
        for plan in &plans {
            committed += self.relations.apply(plan, &self.env)?;
        }
        let released = artifacts.release_unreferenced(&self.env, object.uuid())?;

        for name in &names {
            if let Some(slot) = object.table.get_mut(name) {
                slot.commit();
            }
        }
        info!(
            uuid = %object.uuid(),
            object_type = %object.object_type(),
            attributes = write_keys.len(),
            foreign = committed,
            released,
            "saved object"
        );
        Ok(object.uuid().to_string())
    }

    /// Storage form of one out-table slot and the backend it goes to
    fn to_storage(&self, schema: &CompiledSchema, key: &str, out: &ValueTable) -> Result<Option<(String, Vec<Value>)>> {
        let attr = schema.require(key)?;
        let slot = out.require(key)?;
        if slot.skip_save || attr.is_virtual() {
            return Ok(None);
        }
        let values = self
            .registries
            .types
            .convert(&slot.backend_type, &attr.backend_type, &slot.current, key)?;
        let backend = slot
            .backend
            .first()
            .or_else(|| attr.backends.first())
            .cloned()
            .unwrap_or_else(|| schema.backend().to_string());
        Ok(Some((backend, values)))
    }

    /// Delete an object
    ///
    /// Memberships held through relation attributes are withdrawn from the
    /// foreign objects first.
    ///
    /// # Errors
    ///
    /// [`Error::PermissionDenied`], relation and backend failures.
    pub fn remove(&self, object: Object, user: Option<&str>) -> EngineResult<()> {
        if object.is_new() {
            return Ok(());
        }
        self.authorize(&object, user, "d")?;

        let mut plans = Vec::new();
        for attr in object.schema.attributes() {
            let mapping = match &attr.relation {
                Some(mapping) => Arc::clone(mapping),
                None => continue,
            };
            let local_value = match object.table.values(&mapping.local_match_attribute).first() {
                Some(v) => v.clone(),
                None => continue,
            };
            let held = &object.table.require(attr.name())?.original;
            plans.push(self.relations.plan(mapping, local_value, held, &[], &self.env)?);
        }
        for plan in &plans {
            self.relations.apply(plan, &self.env)?;
        }

        self.env
            .backend(object.schema.backend())?
            .remove(object.uuid(), &Params::new())?;
        info!(uuid = %object.uuid(), object_type = %object.object_type(), "removed object");
        Ok(())
    }

    // =========================================================================
    // Bulk import
    // =========================================================================

    /// Defer relation resolution until [`ObjectEngine::finish_import`]
    pub fn begin_import(&self) {
        self.relations.import().begin();
    }

    /// End the import and hand back the objects loaded meanwhile
    pub fn finish_import(&self) -> Vec<String> {
        self.relations.import().finish()
    }

    /// Reload objects whose relations were deferred
    ///
    /// Objects that vanished since are skipped.
    ///
    /// # Errors
    ///
    /// The first load error.
    pub fn resolve_pending(&self, uuids: &[String]) -> EngineResult<Vec<Object>> {
        let mut objects = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            let hits = self
                .env
                .search
                .search(&Query::new().eq(UUID, uuid.as_str()), &[TYPE])?;
            let object_type = match hits
                .first()
                .and_then(|r| r.get(TYPE))
                .and_then(|v| v.first())
                .and_then(Value::as_str)
            {
                Some(t) => t.to_string(),
                None => {
                    debug!(uuid = %uuid, "pending object no longer exists");
                    continue;
                }
            };
            objects.push(self.load(&object_type, uuid)?);
        }
        info!(resolved = objects.len(), "resolved deferred relations");
        Ok(objects)
    }
}
