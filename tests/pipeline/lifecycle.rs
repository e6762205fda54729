//! Create, load, modify and remove through the facade

use crate::common::*;
use attrflow::{EngineError, Error, Value};

#[test]
fn test_user_lifecycle() {
    let (directory, engine) = engine(&[USER, GROUP]);

    let mut user = engine.create("User").unwrap();
    engine.set(&mut user, "uid", strings(&["jdoe"])).unwrap();
    engine.set(&mut user, "uidNumber", vec![Value::Int(1001)]).unwrap();
    engine
        .set(&mut user, "mail", strings(&["jdoe@example.org", "j.doe@example.org"]))
        .unwrap();
    let uuid = engine.save(&mut user, None).unwrap();

    assert_eq!(stored(&directory, &uuid, "uidNumber"), strings(&["1001"]));
    assert_eq!(
        stored(&directory, &uuid, "mail"),
        strings(&["jdoe@example.org", "j.doe@example.org"])
    );

    let mut user = engine.load("User", &uuid).unwrap();
    assert_eq!(user.get("uidNumber").unwrap(), &[Value::Int(1001)]);
    engine.set(&mut user, "cn", strings(&["Jane Doe"])).unwrap();
    assert_eq!(engine.changed(&user).unwrap(), vec!["cn".to_string()]);
    engine.save(&mut user, None).unwrap();
    assert_eq!(stored(&directory, &uuid, "cn"), strings(&["Jane Doe"]));

    engine.set(&mut user, "cn", vec![]).unwrap();
    engine.save(&mut user, None).unwrap();
    assert!(stored(&directory, &uuid, "cn").is_empty());

    engine.remove(user, None).unwrap();
    assert!(directory.get(&uuid).is_none());
}

#[test]
fn test_rejected_save_lists_attributes_with_offending_values() {
    let (directory, engine) = engine(&[USER]);

    let mut user = engine.create("User").unwrap();
    engine.set(&mut user, "uid", strings(&["Not Valid"])).unwrap();
    engine.set(&mut user, "uidNumber", vec![Value::Int(12)]).unwrap();
    engine
        .set(&mut user, "mail", strings(&["ok@example.org", "broken"]))
        .unwrap();

    let err = engine.save(&mut user, None).unwrap_err();
    let errors = err.attribute_errors();
    let names: Vec<&str> = errors.iter().map(|e| e.attribute.as_str()).collect();
    assert_eq!(names, vec!["uid", "uidNumber", "mail"]);

    let mail = &errors[2];
    assert_eq!(mail.index, Some(1));
    assert_eq!(mail.value, Some(Value::from("broken")));
    assert!(matches!(mail.error, Error::Validation { .. }));
    assert!(err.to_string().starts_with("3 attribute(s) rejected"));
    assert!(directory.is_empty());
}

#[test]
fn test_unknown_object_type() {
    let (_, engine) = engine(&[USER]);
    assert!(matches!(engine.create("Printer"), Err(Error::SchemaConfiguration(_))));
    assert!(matches!(
        engine.load("Printer", "p-1"),
        Err(EngineError::Core(Error::SchemaConfiguration(_)))
    ));
}

#[test]
fn test_load_of_missing_object_is_a_backend_error() {
    let (_, engine) = engine(&[USER]);
    let err = engine.load("User", "nope").unwrap_err();
    assert!(matches!(err, EngineError::Core(Error::Backend(_))));
    assert!(err.attribute_errors().is_empty());
}
