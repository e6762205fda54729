//! Engines opened from a directory with `attrflow.toml` and schema files

use std::sync::Arc;

use crate::common::*;
use attrflow::{Collaborators, EngineConfig, Error, MemoryDirectory, ObjectEngine, Registries};
use tempfile::TempDir;

fn open(base: &std::path::Path, env: Collaborators) -> attrflow::Result<ObjectEngine> {
    ObjectEngine::open(base, Arc::new(Registries::builtin()), env)
}

#[test]
fn test_first_open_writes_default_config() {
    let dir = TempDir::new().unwrap();
    write_schemas(
        &dir.path().join("schema"),
        &[("user.json", USER), ("group.json", GROUP), ("README", "not a schema")],
    );

    let engine = open(dir.path(), Collaborators::in_memory("mem", Arc::new(MemoryDirectory::new())))
        .unwrap();
    assert_eq!(engine.object_types(), vec!["PosixGroup".to_string(), "User".to_string()]);

    let written = EngineConfig::from_file(&dir.path().join("attrflow.toml")).unwrap();
    assert_eq!(&written, engine.config());
}

#[test]
fn test_configured_backend_and_schema_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("attrflow.toml"),
        "schema_dir = \"types\"\ndefault_backend = \"ldap\"\ncheck_acl = false\n",
    )
    .unwrap();
    write_schemas(&dir.path().join("types"), &[("group.json", GROUP)]);

    let primary = Arc::new(MemoryDirectory::new());
    let ldap = Arc::new(MemoryDirectory::new());
    let env = Collaborators::in_memory("mem", primary.clone()).with_backend("ldap", ldap.clone());
    let engine = open(dir.path(), env).unwrap();
    assert!(!engine.config().check_acl);
    assert_eq!(engine.schema("PosixGroup").unwrap().backend(), "ldap");

    let mut group = engine.create("PosixGroup").unwrap();
    engine.set(&mut group, "cn", strings(&["staff"])).unwrap();
    let uuid = engine.save(&mut group, Some("anyone")).unwrap();
    assert!(primary.is_empty());
    assert_eq!(stored(&ldap, &uuid, "cn"), strings(&["staff"]));
}

#[test]
fn test_schema_naming_unknown_backend_fails_open() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("attrflow.toml"), "default_backend = \"ldap\"\n").unwrap();
    write_schemas(&dir.path().join("schema"), &[("group.json", GROUP)]);

    let env = Collaborators::in_memory("mem", Arc::new(MemoryDirectory::new()));
    assert!(matches!(open(dir.path(), env), Err(Error::SchemaConfiguration(_))));
}

#[test]
fn test_broken_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("attrflow.toml"), "check_acl = \"maybe\"\n").unwrap();
    let env = Collaborators::in_memory("mem", Arc::new(MemoryDirectory::new()));
    assert!(matches!(open(dir.path(), env), Err(Error::Config(_))));
}
