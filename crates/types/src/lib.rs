//! Attribute type system for attrflow
//!
//! Every attribute declares a value type by name. This crate provides the
//! [`AttributeType`] contract, the built-in types and the [`TypeRegistry`]
//! that converts value lists between types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acl;
pub mod builtin;
pub mod registry;

pub use acl::{AclAction, AclEntry, AclSetType};
pub use builtin::{
    parse_bool, parse_date, parse_int, parse_timestamp, text_of, AnyType, BinaryType,
    BooleanType, DateType, IntegerType, JsonType, StringType, TimestampType, UnicodeStringType,
    DATE_FORMAT, TIMESTAMP_FORMAT,
};
pub use registry::{AttributeType, TypeRegistry};
