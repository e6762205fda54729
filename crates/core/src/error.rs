//! Error types for attrflow
//!
//! This module defines the error taxonomy shared by every layer of the engine.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! | Category | Variants |
//! |----------|----------|
//! | Typing | `TypeConversion`, `UnsupportedConversion` |
//! | Validation | `Validation` (structured records, surfaced as a rejected edit) |
//! | Schema | `SchemaConfiguration`, `UnknownAttribute`, `Config` |
//! | Relations | `RelationAmbiguity`, `RelationNotFound` |
//! | Collaborators | `Backend`, `PermissionDenied`, `UnsupportedOperation` |

use crate::record::ErrorRecord;
use thiserror::Error;

/// Result type alias for attrflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the attribute transformation engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed source data for a conversion
    #[error("cannot convert {value:?} to {type_name}: {reason}")]
    TypeConversion {
        /// Type the value was being converted to or validated as
        type_name: String,
        /// Offending value, rendered for diagnostics
        value: String,
        /// Why the conversion failed
        reason: String,
    },

    /// No conversion path between two types
    #[error("no conversion from {from_type} to {to_type} for attribute '{attribute}'")]
    UnsupportedConversion {
        /// Source type name
        from_type: String,
        /// Target type name
        to_type: String,
        /// Declared attribute alias the conversion was requested for
        attribute: String,
    },

    /// A comparator rejected the value
    #[error("validation failed for attribute '{attribute}' ({} error(s))", records.len())]
    Validation {
        /// Attribute being validated
        attribute: String,
        /// Structured, localizable error records
        records: Vec<ErrorRecord>,
    },

    /// Missing or malformed schema / rule / relation configuration
    #[error("schema configuration error: {0}")]
    SchemaConfiguration(String),

    /// Attribute name not declared in the object's value table
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// More than one foreign object matched during a relation update
    #[error("relation '{attribute}': value {value:?} matches {matches} objects")]
    RelationAmbiguity {
        /// Virtual attribute being updated
        attribute: String,
        /// Value that failed to resolve uniquely
        value: String,
        /// Number of matching foreign objects
        matches: usize,
    },

    /// No foreign object matched during a relation update
    #[error("relation '{attribute}': no object matches value {value:?}")]
    RelationNotFound {
        /// Virtual attribute being updated
        attribute: String,
        /// Value that did not resolve
        value: String,
    },

    /// Base handler not overridden by a concrete implementation
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Backend or search collaborator failure
    #[error("backend error: {0}")]
    Backend(String),

    /// ACL oracle denied an operation
    #[error("permission denied: {user} may not '{permission}' on {topic}")]
    PermissionDenied {
        /// Acting user
        user: String,
        /// ACL topic checked
        topic: String,
        /// Requested permission characters
        permission: String,
    },

    /// Engine configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a [`Error::SchemaConfiguration`]
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::SchemaConfiguration(msg.into())
    }

    /// Shorthand for a [`Error::TypeConversion`]
    pub fn conversion(
        type_name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::TypeConversion {
            type_name: type_name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`Error::UnsupportedConversion`] without attribute context
    pub fn unsupported_conversion(from_type: &str, to_type: &str) -> Self {
        Error::UnsupportedConversion {
            from_type: from_type.to_string(),
            to_type: to_type.to_string(),
            attribute: String::new(),
        }
    }

    /// Shorthand for a [`Error::Backend`]
    pub fn backend(msg: impl Into<String>) -> Self {
        Error::Backend(msg.into())
    }

    /// Attach the declared attribute alias to an unsupported conversion
    ///
    /// Other variants are returned unchanged.
    pub fn with_attribute(self, alias: &str) -> Self {
        match self {
            Error::UnsupportedConversion {
                from_type,
                to_type,
                attribute,
            } if attribute.is_empty() => Error::UnsupportedConversion {
                from_type,
                to_type,
                attribute: alias.to_string(),
            },
            other => other,
        }
    }

    /// True for errors that make a whole save fail rather than one attribute
    pub fn is_fatal_to_save(&self) -> bool {
        matches!(
            self,
            Error::RelationAmbiguity { .. } | Error::RelationNotFound { .. } | Error::Backend(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::conversion("Json", "", e.to_string())
    }
}
