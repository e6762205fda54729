//! In/out rules: branches, key switching, splitting and dates

use crate::common::*;
use attrflow::{Error, Record, Value};
use chrono::{TimeZone, Utc};

const HOST: &str = r#"{
    "name": "Host",
    "attributes": [
        {"name": "cn", "type": "UnicodeString"},
        {"name": "hostName", "type": "UnicodeString", "skip_save": true,
         "out_filter": [{"filter": {"name": "Target", "params": ["cn"]}}]},
        {"name": "status", "type": "UnicodeString",
         "in_filter": [{"choice": [{
            "condition": {"condition": {"name": "Equals", "params": ["0"]}},
            "then": [{"filter": {"name": "SetValue", "params": ["disabled"]}}],
            "else": [{"filter": {"name": "SetValue", "params": ["enabled"]}}]
         }]}],
         "out_filter": [{"choice": [{
            "condition": {"condition": {"name": "Equals", "params": ["disabled"]}},
            "then": [{"filter": {"name": "SetValue", "params": ["0"]}}],
            "else": [{"filter": {"name": "SetValue", "params": ["1"]}}]
         }]}]},
        {"name": "aliases", "type": "UnicodeString", "multivalue": true,
         "in_filter": [{"filter": {"name": "SplitString", "params": [","]}}],
         "out_filter": [{"filter": {"name": "JoinArray", "params": [","]}}]},
        {"name": "expires", "type": "Timestamp", "backend_type": "String",
         "in_filter": [{"filter": {"name": "StringToDatetime"}}],
         "out_filter": [{"filter": {"name": "DatetimeToString"}}]}
    ]
}"#;

fn host(directory: &attrflow::MemoryDirectory, status: &str, expires: &str) {
    let mut record = Record::new();
    record.insert("cn".into(), strings(&["web01"]));
    record.insert("status".into(), strings(&[status]));
    record.insert("aliases".into(), strings(&["www,,static"]));
    record.insert("expires".into(), strings(&[expires]));
    directory.insert("Host", "h-1", None, record);
}

#[test]
fn test_in_rules_shape_loaded_values() {
    let (directory, engine) = engine(&[HOST]);
    host(&directory, "0", "20261018120000Z");

    let host = engine.load("Host", "h-1").unwrap();
    assert_eq!(host.get("status").unwrap(), strings(&["disabled"]).as_slice());
    assert_eq!(host.get("aliases").unwrap(), strings(&["www", "static"]).as_slice());
    assert_eq!(
        host.get("expires").unwrap(),
        &[Value::Timestamp(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap())]
    );
}

#[test]
fn test_out_rules_shape_stored_values() {
    let (directory, engine) = engine(&[HOST]);
    host(&directory, "0", "20261018120000Z");

    let mut host = engine.load("Host", "h-1").unwrap();
    engine.set(&mut host, "status", strings(&["enabled"])).unwrap();
    engine
        .set(&mut host, "aliases", strings(&["www", "cdn"]))
        .unwrap();
    engine
        .set(
            &mut host,
            "expires",
            vec![Value::Timestamp(Utc.with_ymd_and_hms(2027, 1, 2, 3, 4, 5).unwrap())],
        )
        .unwrap();
    engine.save(&mut host, None).unwrap();

    assert_eq!(stored(&directory, "h-1", "status"), strings(&["1"]));
    assert_eq!(stored(&directory, "h-1", "aliases"), strings(&["www,cdn"]));
    assert_eq!(stored(&directory, "h-1", "expires"), strings(&["20270102030405Z"]));
    // Application values stay untouched by the out rules.
    assert_eq!(host.get("status").unwrap(), strings(&["enabled"]).as_slice());
}

#[test]
fn test_key_switch_writes_the_target_attribute() {
    let (directory, engine) = engine(&[HOST]);
    host(&directory, "1", "20261018120000Z");

    let mut host = engine.load("Host", "h-1").unwrap();
    engine.set(&mut host, "hostName", strings(&["web02"])).unwrap();
    engine.save(&mut host, None).unwrap();

    assert_eq!(stored(&directory, "h-1", "cn"), strings(&["web02"]));
    assert!(stored(&directory, "h-1", "hostName").is_empty());
}

#[test]
fn test_broken_stored_value_rejects_only_its_attribute() {
    let (directory, engine) = engine(&[HOST]);
    host(&directory, "1", "not a date");

    let err = engine.load("Host", "h-1").unwrap_err();
    let errors = err.attribute_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].attribute, "expires");
    assert!(matches!(errors[0].error, Error::TypeConversion { .. }));
}
