//! Object-level errors
//!
//! Per-attribute failures are collected rather than returned one at a time,
//! so a rejected save reports every offending attribute together.

use attrflow_core::{Error, Value};
use thiserror::Error;

/// Failure of one attribute's pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeError {
    /// Attribute whose pipeline failed
    pub attribute: String,
    /// Offending element, when known
    pub index: Option<usize>,
    /// Offending value, when known
    pub value: Option<Value>,
    /// Underlying error
    pub error: Error,
}

impl AttributeError {
    /// Wrap an error raised while processing `attribute`
    ///
    /// Validation errors take index and value from their first record.
    pub fn new(attribute: impl Into<String>, error: Error, values: &[Value]) -> Self {
        let index = match &error {
            Error::Validation { records, .. } => records.first().map(|r| r.index),
            _ => None,
        };
        AttributeError {
            attribute: attribute.into(),
            index,
            value: index.and_then(|i| values.get(i).cloned()),
            error,
        }
    }
}

impl std::fmt::Display for AttributeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.attribute)?;
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Errors surfaced by the object engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// One or more attribute pipelines failed
    #[error("{} attribute(s) rejected: {}", .0.len(), render(.0))]
    Attributes(Vec<AttributeError>),

    /// Object-level failure
    #[error(transparent)]
    Core(#[from] Error),
}

fn render(errors: &[AttributeError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    /// Attribute errors, empty for object-level failures
    pub fn attribute_errors(&self) -> &[AttributeError] {
        match self {
            EngineError::Attributes(errors) => errors,
            EngineError::Core(_) => &[],
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use attrflow_core::ErrorRecord;

    #[test]
    fn test_validation_error_carries_offending_value() {
        let values = vec![Value::from("1"), Value::from("2")];
        let error = Error::Validation {
            attribute: "n".into(),
            records: vec![ErrorRecord::new(1, "value {value} is not greater than 3")],
        };
        let wrapped = AttributeError::new("n", error, &values);
        assert_eq!(wrapped.index, Some(1));
        assert_eq!(wrapped.value, Some(Value::from("2")));
        assert!(wrapped.to_string().starts_with("n[1]: "));
    }

    #[test]
    fn test_display_lists_every_attribute() {
        let err = EngineError::Attributes(vec![
            AttributeError::new("uid", Error::schema("x"), &[]),
            AttributeError::new("cn", Error::UnknownAttribute("cn".into()), &[]),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 attribute(s) rejected"));
        assert!(msg.contains("uid: "));
        assert!(msg.contains("cn: "));
    }
}
