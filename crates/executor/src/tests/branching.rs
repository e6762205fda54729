//! Control flow through compiled programs

use super::{strings, table, World};
use crate::Executor;
use attrflow_core::Error;

const SHOUT_OR_TAG: &str = r#"[
    {"choice": [{
        "condition": {"condition": {"name": "Equals", "params": ["admin"]}},
        "then": [{"filter": {"name": "SetValue", "params": ["root"]}},
                 {"filter": {"name": "ConcatString", "params": ["!", "right"]}}],
        "else": [{"filter": {"name": "ConcatString", "params": ["user-", "left"]}}]
    }]}
]"#;

#[test]
fn test_then_branch_taken() {
    let world = World::new();
    let program = world.compile(SHOUT_OR_TAG);
    let mut t = table(&[("role", &["admin"])]);
    let key = Executor::new(world.ctx()).execute(&program, "role", &mut t).unwrap();
    assert_eq!(key, "role");
    assert_eq!(strings(&t, "role"), vec!["root!"]);
}

#[test]
fn test_else_branch_taken() {
    let world = World::new();
    let program = world.compile(SHOUT_OR_TAG);
    let mut t = table(&[("role", &["guest"])]);
    Executor::new(world.ctx()).execute(&program, "role", &mut t).unwrap();
    assert_eq!(strings(&t, "role"), vec!["user-guest"]);
}

#[test]
fn test_operator_combination() {
    let world = World::new();
    let program = world.compile(
        r#"[{"choice": [{
            "condition": {"operator": {"op": "or",
                "left":  {"condition": {"name": "Equals", "params": ["a"]}},
                "right": {"condition": {"name": "RegEx", "params": ["b.*"]}}}},
            "then": [{"filter": {"name": "SetValue", "params": ["hit"]}}]
        }]}]"#,
    );
    let executor = Executor::new(world.ctx());

    let mut t = table(&[("x", &["bob"])]);
    executor.execute(&program, "x", &mut t).unwrap();
    assert_eq!(strings(&t, "x"), vec!["hit"]);

    let mut t = table(&[("x", &["carl"])]);
    executor.execute(&program, "x", &mut t).unwrap();
    assert_eq!(strings(&t, "x"), vec!["carl"]);
}

#[test]
fn test_target_switches_working_key() {
    let world = World::new();
    let program = world.compile(
        r#"[
            {"filter": {"name": "Target", "params": ["mail"]}},
            {"filter": {"name": "ConcatString", "params": ["@example.org", "right"]}}
        ]"#,
    );
    let mut t = table(&[("uid", &["jdoe"])]);
    let key = Executor::new(world.ctx()).execute(&program, "uid", &mut t).unwrap();
    assert_eq!(key, "mail");
    assert_eq!(strings(&t, "uid"), vec!["jdoe"]);
    assert_eq!(strings(&t, "mail"), vec!["jdoe@example.org"]);
}

#[test]
fn test_unknown_key_rejected() {
    let world = World::new();
    let program = world.compile(r#"[{"filter": {"name": "Clear"}}]"#);
    let mut t = table(&[]);
    assert!(matches!(
        Executor::new(world.ctx()).execute(&program, "missing", &mut t),
        Err(Error::UnknownAttribute(_))
    ));
}

#[test]
fn test_filter_error_aborts_run() {
    let world = World::new();
    let program = world.compile(
        r#"[
            {"filter": {"name": "ConvertType", "params": ["Integer"]}},
            {"filter": {"name": "SetValue", "params": ["unreached"]}}
        ]"#,
    );
    let mut t = table(&[("uidNumber", &["not-a-number"])]);
    let result = Executor::new(world.ctx()).execute(&program, "uidNumber", &mut t);
    assert!(matches!(result, Err(Error::TypeConversion { .. })));
    assert_ne!(strings(&t, "uidNumber"), vec!["unreached"]);
}

#[test]
fn test_empty_program_is_noop() {
    let world = World::new();
    let program = world.compile("[]");
    let mut t = table(&[("cn", &["x"])]);
    let outcome = Executor::new(world.ctx()).run_program(&program, "cn", &mut t).unwrap();
    assert_eq!(outcome.key, "cn");
    assert!(outcome.result);
    assert_eq!(strings(&t, "cn"), vec!["x"]);
}
