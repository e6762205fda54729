//! Common test utilities for pipeline tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use attrflow::{
    Collaborators, EngineConfig, MemoryDirectory, ObjectEngine, ObjectSchema, Record, Registries,
    Value,
};

pub const USER: &str = r#"{
    "name": "User",
    "attributes": [
        {"name": "uid", "type": "UnicodeString", "mandatory": true,
         "validator": {"condition": {"name": "RegEx", "params": ["^[a-z][a-z0-9]*$"]}}},
        {"name": "cn", "type": "UnicodeString"},
        {"name": "uidNumber", "type": "Integer", "backend_type": "UnicodeString",
         "validator": {"condition": {"name": "Greater", "params": ["999"]}}},
        {"name": "mail", "type": "UnicodeString", "multivalue": true,
         "validator": {"condition": {"name": "IsValidMailAddress"}}},
        {"name": "groupMembership", "type": "UnicodeString", "multivalue": true,
         "relation": "PosixGroup:cn,memberUid=uid"}
    ]
}"#;

pub const GROUP: &str = r#"{
    "name": "PosixGroup",
    "attributes": [
        {"name": "cn", "type": "UnicodeString", "mandatory": true},
        {"name": "memberUid", "type": "UnicodeString", "multivalue": true}
    ]
}"#;

/// Parse an inline schema
pub fn schema(json: &str) -> ObjectSchema {
    serde_json::from_str(json).unwrap()
}

/// Engine over one in-memory directory registered as backend `mem`
pub fn engine(schemas: &[&str]) -> (Arc<MemoryDirectory>, ObjectEngine) {
    let directory = Arc::new(MemoryDirectory::new());
    let env = Collaborators::in_memory("mem", directory.clone());
    let engine = engine_with(env, schemas);
    (directory, engine)
}

/// Engine over the given collaborators
pub fn engine_with(env: Collaborators, schemas: &[&str]) -> ObjectEngine {
    let engine =
        ObjectEngine::new(EngineConfig::default(), Arc::new(Registries::builtin()), env).unwrap();
    for json in schemas {
        engine.register(&schema(json)).unwrap();
    }
    engine
}

/// Write schema files into `dir`
pub fn write_schemas(dir: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, json) in files {
        std::fs::write(dir.join(name), json).unwrap();
    }
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

/// Store a group directly in the directory
pub fn group(directory: &MemoryDirectory, uuid: &str, cn: &str, members: &[&str]) {
    let mut record = Record::new();
    record.insert("cn".into(), strings(&[cn]));
    if !members.is_empty() {
        record.insert("memberUid".into(), strings(members));
    }
    directory.insert("PosixGroup", uuid, None, record);
}

/// Stored values of one attribute, empty when absent
pub fn stored(directory: &MemoryDirectory, uuid: &str, attribute: &str) -> Vec<Value> {
    directory
        .get(uuid)
        .and_then(|r| r.get(attribute).cloned())
        .unwrap_or_default()
}
