//! Flag strings unpacked into booleans and packed again on save

use crate::common::*;
use attrflow::{Record, Value};

const SAMBA_USER: &str = r#"{
    "name": "SambaUser",
    "attributes": [
        {"name": "uid", "type": "UnicodeString"},
        {"name": "sambaAcctFlags", "type": "String",
         "depends_on": ["sambaNormalUserAccount", "sambaAccountDisabled", "sambaPasswordNeverExpires"],
         "in_filter": [{"filter": {"name": "UnmarshalSambaAcctFlags"}}],
         "out_filter": [{"filter": {"name": "MarshalSambaAcctFlags"}}]},
        {"name": "sambaNormalUserAccount", "type": "Boolean", "skip_save": true},
        {"name": "sambaAccountDisabled", "type": "Boolean", "skip_save": true},
        {"name": "sambaPasswordNeverExpires", "type": "Boolean", "skip_save": true}
    ]
}"#;

fn samba_user(directory: &attrflow::MemoryDirectory, flags: &str) {
    let mut record = Record::new();
    record.insert("uid".into(), strings(&["jdoe"]));
    record.insert("sambaAcctFlags".into(), strings(&[flags]));
    directory.insert("SambaUser", "s-1", None, record);
}

#[test]
fn test_flags_unpack_on_load() {
    let (directory, engine) = engine(&[SAMBA_USER]);
    samba_user(&directory, "[UX         ]");

    let user = engine.load("SambaUser", "s-1").unwrap();
    assert_eq!(user.get("sambaNormalUserAccount").unwrap(), &[Value::Bool(true)]);
    assert_eq!(user.get("sambaAccountDisabled").unwrap(), &[Value::Bool(false)]);
    assert_eq!(user.get("sambaPasswordNeverExpires").unwrap(), &[Value::Bool(true)]);
    assert!(engine.changed(&user).unwrap().is_empty());
}

#[test]
fn test_changed_boolean_repacks_flags() {
    let (directory, engine) = engine(&[SAMBA_USER]);
    samba_user(&directory, "[UX         ]");

    let mut user = engine.load("SambaUser", "s-1").unwrap();
    engine
        .set(&mut user, "sambaAccountDisabled", vec![Value::Bool(true)])
        .unwrap();
    assert_eq!(
        engine.changed(&user).unwrap(),
        vec!["sambaAcctFlags".to_string(), "sambaAccountDisabled".to_string()]
    );
    engine.save(&mut user, None).unwrap();

    assert_eq!(stored(&directory, "s-1", "sambaAcctFlags"), strings(&["[UDX        ]"]));
    assert!(stored(&directory, "s-1", "sambaAccountDisabled").is_empty());

    let user = engine.load("SambaUser", "s-1").unwrap();
    assert_eq!(user.get("sambaAccountDisabled").unwrap(), &[Value::Bool(true)]);
}

#[test]
fn test_cleared_flags_keep_their_width() {
    let (directory, engine) = engine(&[SAMBA_USER]);
    samba_user(&directory, "[U          ]");

    let mut user = engine.load("SambaUser", "s-1").unwrap();
    engine
        .set(&mut user, "sambaNormalUserAccount", vec![Value::Bool(false)])
        .unwrap();
    engine.save(&mut user, None).unwrap();
    assert_eq!(stored(&directory, "s-1", "sambaAcctFlags"), strings(&["[           ]"]));
}
