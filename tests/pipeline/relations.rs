//! Virtual attributes backed by other objects

use crate::common::*;
use attrflow::{EngineError, Error, Value};

fn user_in_groups(engine: &attrflow::ObjectEngine, groups: &[&str]) -> String {
    let mut user = engine.create("User").unwrap();
    engine.set(&mut user, "uid", strings(&["jdoe"])).unwrap();
    engine.set(&mut user, "uidNumber", vec![Value::Int(1000)]).unwrap();
    engine.set(&mut user, "groupMembership", strings(groups)).unwrap();
    engine.save(&mut user, None).unwrap()
}

#[test]
fn test_membership_follows_the_group_objects() {
    let (directory, engine) = engine(&[USER, GROUP]);
    group(&directory, "g-a", "a", &[]);
    group(&directory, "g-b", "b", &["other"]);
    group(&directory, "g-c", "c", &["jdoe"]);

    let uuid = user_in_groups(&engine, &["a", "b"]);
    assert_eq!(stored(&directory, "g-a", "memberUid"), strings(&["jdoe"]));
    assert_eq!(stored(&directory, "g-b", "memberUid"), strings(&["other", "jdoe"]));
    assert!(stored(&directory, &uuid, "groupMembership").is_empty());

    // g-c already lists jdoe, so it shows up without ever being set.
    let mut user = engine.load("User", &uuid).unwrap();
    let mut groups = user.get("groupMembership").unwrap().to_vec();
    groups.sort_by_key(|v| v.to_string());
    assert_eq!(groups, strings(&["a", "b", "c"]));

    engine.set(&mut user, "groupMembership", strings(&["b", "c"])).unwrap();
    engine.save(&mut user, None).unwrap();
    assert!(stored(&directory, "g-a", "memberUid").is_empty());
    assert_eq!(stored(&directory, "g-b", "memberUid"), strings(&["other", "jdoe"]));
    assert_eq!(stored(&directory, "g-c", "memberUid"), strings(&["jdoe"]));
}

#[test]
fn test_groups_created_through_the_engine_are_found() {
    let (directory, engine) = engine(&[USER, GROUP]);

    let mut admins = engine.create("PosixGroup").unwrap();
    engine.set(&mut admins, "cn", strings(&["admins"])).unwrap();
    let gid = engine.save(&mut admins, None).unwrap();

    user_in_groups(&engine, &["admins"]);
    let admins = engine.load("PosixGroup", &gid).unwrap();
    assert_eq!(admins.get("memberUid").unwrap(), strings(&["jdoe"]).as_slice());
    assert_eq!(stored(&directory, &gid, "memberUid"), strings(&["jdoe"]));
}

#[test]
fn test_ambiguous_group_name_rejects_the_save() {
    let (directory, engine) = engine(&[USER, GROUP]);
    group(&directory, "g-1", "dup", &[]);
    group(&directory, "g-2", "dup", &[]);

    let mut user = engine.create("User").unwrap();
    engine.set(&mut user, "uid", strings(&["jdoe"])).unwrap();
    engine.set(&mut user, "groupMembership", strings(&["dup"])).unwrap();
    let err = engine.save(&mut user, None).unwrap_err();

    assert!(matches!(
        err,
        EngineError::Attributes(ref errors)
            if matches!(errors[0].error, Error::RelationAmbiguity { matches: 2, .. })
    ));
    assert_eq!(directory.len(), 2);
    assert!(stored(&directory, "g-1", "memberUid").is_empty());
}

#[test]
fn test_bulk_import_defers_and_resolves() {
    let (directory, engine) = engine(&[USER, GROUP]);
    group(&directory, "g-a", "a", &[]);
    let uuid = user_in_groups(&engine, &["a"]);

    engine.begin_import();
    assert!(engine.relations().import().is_importing());
    let user = engine.load("User", &uuid).unwrap();
    assert!(user.is_deferred());
    let again = engine.load("User", &uuid).unwrap();
    assert!(again.is_deferred());

    let pending = engine.finish_import();
    assert_eq!(pending, vec![uuid.clone()]);
    assert!(!engine.relations().import().is_importing());

    let resolved = engine.resolve_pending(&pending).unwrap();
    assert_eq!(resolved.len(), 1);
    assert!(!resolved[0].is_deferred());
    assert_eq!(resolved[0].get("groupMembership").unwrap(), strings(&["a"]).as_slice());
}

#[test]
fn test_removing_the_user_leaves_no_dangling_members() {
    let (directory, engine) = engine(&[USER, GROUP]);
    group(&directory, "g-a", "a", &["other"]);
    let uuid = user_in_groups(&engine, &["a"]);

    let user = engine.load("User", &uuid).unwrap();
    engine.remove(user, None).unwrap();
    assert_eq!(stored(&directory, "g-a", "memberUid"), strings(&["other"]));
}
