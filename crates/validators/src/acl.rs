//! Structural checks for ACL entries
//!
//! Each entry runs through a small state machine; the first violation ends
//! the check of that entry and, since comparators fail fast, the whole list.
//!
//! 1. `priority` (and for ACL sets `members`) must be present.
//! 2. An entry naming a `rolename` must not carry `actions`, the name must
//!    be a string and the role must exist.
//! 3. Otherwise `scope` and `actions` are required. Every action needs a
//!    string `topic` and `acl`; `acl` characters come from [`ACL_CHARS`];
//!    only `topic`, `acl` and `options` keys are allowed; `options` must be
//!    a mapping.

use std::collections::BTreeMap;

use attrflow_core::{ErrorRecord, Result, Value, Verdict};
use attrflow_types::AclEntry;

use crate::comparator::{first_failure, CheckContext, Comparator};

/// Permission characters accepted in an action's `acl`
pub const ACL_CHARS: &str = "crowdsexm";

const ACTION_KEYS: [&str; 3] = ["topic", "acl", "options"];

fn entry_map(value: &Value) -> Option<BTreeMap<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        other => {
            let text = other.as_text()?;
            match AclEntry::decode(&text).ok()?.to_value() {
                Value::Object(map) => Some(map),
                _ => None,
            }
        }
    }
}

fn check_entry(ctx: &CheckContext<'_>, index: usize, value: &Value, require_members: bool) -> Option<ErrorRecord> {
    let fail = |detail: &str| Some(ErrorRecord::new(index, detail.to_string()));

    let entry = match entry_map(value) {
        Some(entry) => entry,
        None => return fail("ACL entry is not a mapping"),
    };
    if !entry.contains_key("priority") {
        return fail("ACL entry has no priority");
    }
    if require_members && !entry.contains_key("members") {
        return fail("ACL entry has no members");
    }

    if let Some(role) = entry.get("rolename").filter(|r| !r.is_null()) {
        if entry.get("actions").map_or(false, |a| !a.is_null()) {
            return fail("ACL entry cannot reference a role and carry actions");
        }
        let role = match role.as_str() {
            Some(role) => role,
            None => return fail("ACL role name must be a string"),
        };
        if !ctx.env.acl.role_exists(role) {
            return Some(ErrorRecord::new(index, "unknown ACL role {role}").with("role", role));
        }
        return None;
    }

    if entry.get("scope").map_or(true, Value::is_null) {
        return fail("ACL entry has no scope");
    }
    let actions = match entry.get("actions").and_then(Value::as_array) {
        Some(actions) => actions,
        None => return fail("ACL entry has no actions"),
    };
    actions.iter().find_map(|action| check_action(index, action))
}

fn check_action(index: usize, action: &Value) -> Option<ErrorRecord> {
    let fail = |detail: &str| Some(ErrorRecord::new(index, detail.to_string()));

    let action = match action.as_object() {
        Some(action) => action,
        None => return fail("ACL action is not a mapping"),
    };
    if action.get("topic").and_then(Value::as_str).is_none() {
        return fail("ACL action needs a string topic");
    }
    let acl = match action.get("acl").and_then(Value::as_str) {
        Some(acl) => acl,
        None => return fail("ACL action needs a string acl"),
    };
    if let Some(bad) = acl.chars().find(|c| !ACL_CHARS.contains(*c)) {
        return Some(
            ErrorRecord::new(index, "invalid ACL character {char} in {acl}")
                .with("char", bad)
                .with("acl", acl),
        );
    }
    if let Some(extra) = action.keys().find(|k| !ACTION_KEYS.contains(&k.as_str())) {
        return Some(ErrorRecord::new(index, "unexpected ACL action key {key}").with("key", extra));
    }
    if action.get("options").map_or(false, |o| !o.is_object()) {
        return fail("ACL action options must be a mapping");
    }
    None
}

/// Every element is a well-formed ACL set entry
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAclSet;

impl Comparator for IsAclSet {
    fn name(&self) -> &'static str {
        "IsAclSet"
    }

    fn process(&self, ctx: &CheckContext<'_>, _key: &str, values: &[Value], _params: &[String]) -> Result<Verdict> {
        first_failure(values, |index, value| Ok(check_entry(ctx, index, value, true)))
    }
}

/// Every element is a well-formed role definition entry (no `members`)
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAclRole;

impl Comparator for IsAclRole {
    fn name(&self) -> &'static str {
        "IsAclRole"
    }

    fn process(&self, ctx: &CheckContext<'_>, _key: &str, values: &[Value], _params: &[String]) -> Result<Verdict> {
        first_failure(values, |index, value| Ok(check_entry(ctx, index, value, false)))
    }
}
