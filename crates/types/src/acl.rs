//! AclSet type and its storage encoding
//!
//! An ACL set is a list of entries. Each entry either references a role or
//! carries explicit actions. The storage form is one string per entry:
//!
//! ```text
//! line 0   scope            (empty when the entry references a role)
//! line 1   priority
//! line 2   members          (comma-joined)
//! line 3   role name        (empty when the entry carries actions)
//! line 4.. topic:acl:options-json
//! ```
//!
//! The encoding is positional and consumed by other components; it must stay
//! byte-for-byte stable. `{priority: "high", members: [], rolename: "role1"}`
//! encodes to `"\nhigh\n\nrole1"`.

use attrflow_core::{Error, Result, Value};
use serde::{Deserialize, Serialize};

use crate::builtin::text_of;
use crate::registry::AttributeType;

/// One permission grant inside an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclAction {
    /// Topic the permission applies to
    pub topic: String,
    /// Permission characters (`c r o w d s e x m`)
    pub acl: String,
    /// Extra options, stored as a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Map<String, serde_json::Value>>,
}

/// One ACL set entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Evaluation priority
    pub priority: String,
    /// Members the entry applies to
    pub members: Vec<String>,
    /// Scope of explicit actions (`one`, `sub`, `psub`, `reset`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Referenced role; mutually exclusive with `actions`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolename: Option<String>,
    /// Explicit actions; mutually exclusive with `rolename`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<AclAction>>,
}

impl AclEntry {
    /// Entry referencing a role
    pub fn role(priority: impl Into<String>, members: Vec<String>, rolename: impl Into<String>) -> Self {
        AclEntry {
            priority: priority.into(),
            members,
            scope: None,
            rolename: Some(rolename.into()),
            actions: None,
        }
    }

    /// Entry with explicit actions
    pub fn with_actions(
        priority: impl Into<String>,
        members: Vec<String>,
        scope: impl Into<String>,
        actions: Vec<AclAction>,
    ) -> Self {
        AclEntry {
            priority: priority.into(),
            members,
            scope: Some(scope.into()),
            rolename: None,
            actions: Some(actions),
        }
    }

    /// Encode into the positional storage string
    pub fn encode(&self) -> Result<String> {
        let scope = match self.rolename {
            Some(_) => "",
            None => self.scope.as_deref().unwrap_or(""),
        };
        let mut lines = vec![
            scope.to_string(),
            self.priority.clone(),
            self.members.join(","),
            self.rolename.clone().unwrap_or_default(),
        ];
        if self.rolename.is_none() {
            for action in self.actions.iter().flatten() {
                let options = match &action.options {
                    Some(map) => serde_json::to_string(map)?,
                    None => String::new(),
                };
                lines.push(format!("{}:{}:{}", action.topic, action.acl, options));
            }
        }
        Ok(lines.join("\n"))
    }

    /// Decode a positional storage string
    ///
    /// # Errors
    ///
    /// [`Error::TypeConversion`] when fewer than four lines are present, an
    /// action line lacks `topic:acl`, or options are not a JSON object.
    pub fn decode(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < 4 {
            return Err(Error::conversion(
                "AclSet",
                text,
                format!("expected at least 4 lines, found {}", lines.len()),
            ));
        }
        let members = if lines[2].is_empty() {
            Vec::new()
        } else {
            lines[2].split(',').map(str::to_string).collect()
        };
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        if !lines[3].is_empty() {
            return Ok(AclEntry {
                priority: lines[1].to_string(),
                members,
                scope: non_empty(lines[0]),
                rolename: Some(lines[3].to_string()),
                actions: None,
            });
        }

        let actions = lines[4..]
            .iter()
            .map(|line| decode_action(text, line))
            .collect::<Result<Vec<_>>>()?;
        Ok(AclEntry {
            priority: lines[1].to_string(),
            members,
            scope: non_empty(lines[0]),
            rolename: None,
            actions: Some(actions),
        })
    }

    /// Structured value form (`Value::Object`)
    pub fn to_value(&self) -> Value {
        let json = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        Value::from(json)
    }

    /// Parse the structured value form
    ///
    /// Integer priorities are accepted and rendered as text.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut json: serde_json::Value = value.clone().into();
        if let Some(priority) = json.get_mut("priority") {
            if let Some(n) = priority.as_i64() {
                *priority = serde_json::Value::String(n.to_string());
            }
        }
        serde_json::from_value(json).map_err(|e| Error::conversion("AclSet", value.to_string(), e.to_string()))
    }
}

fn decode_action(text: &str, line: &str) -> Result<AclAction> {
    let mut parts = line.splitn(3, ':');
    let topic = parts.next().unwrap_or_default();
    let acl = parts
        .next()
        .ok_or_else(|| Error::conversion("AclSet", text, format!("malformed action line {:?}", line)))?;
    let options = match parts.next() {
        None | Some("") => None,
        Some(raw) => {
            let parsed: serde_json::Value = serde_json::from_str(raw)
                .map_err(|e| Error::conversion("AclSet", raw, e.to_string()))?;
            match parsed {
                serde_json::Value::Object(map) => Some(map),
                other => {
                    return Err(Error::conversion(
                        "AclSet",
                        other.to_string(),
                        "action options must be a JSON object",
                    ))
                }
            }
        }
    };
    Ok(AclAction {
        topic: topic.to_string(),
        acl: acl.to_string(),
        options,
    })
}

/// Composite type for ACL entry lists
#[derive(Debug, Clone, Copy, Default)]
pub struct AclSetType;

impl AttributeType for AclSetType {
    fn name(&self) -> &'static str {
        "AclSet"
    }

    fn is_valid_value(&self, values: &[Value]) -> bool {
        values.iter().all(|v| AclEntry::from_value(v).is_ok())
    }

    fn values_match(&self, a: &[Value], b: &[Value]) -> bool {
        let entries = |values: &[Value]| {
            values
                .iter()
                .map(AclEntry::from_value)
                .collect::<Result<Vec<_>>>()
                .ok()
        };
        match (entries(a), entries(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        }
    }

    fn convert_to(&self, target: &str, values: &[Value]) -> Result<Vec<Value>> {
        let wrap: fn(String) -> Value = match target {
            "String" => |s: String| Value::Bytes(s.into_bytes()),
            "UnicodeString" => Value::String,
            _ => return Err(Error::unsupported_conversion("AclSet", target)),
        };
        values
            .iter()
            .map(|v| AclEntry::from_value(v)?.encode().map(wrap))
            .collect()
    }

    fn convert_from(&self, source: &str, values: &[Value]) -> Result<Vec<Value>> {
        if source != "String" && source != "UnicodeString" {
            return Err(Error::unsupported_conversion(source, "AclSet"));
        }
        values
            .iter()
            .map(|v| Ok(AclEntry::decode(&text_of("AclSet", v)?)?.to_value()))
            .collect()
    }
}
