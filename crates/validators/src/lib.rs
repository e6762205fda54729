//! Comparator library for attrflow
//!
//! Comparators are the building blocks of conditions in rule programs and of
//! attribute validators. Each one inspects a value list and returns a
//! [`Verdict`](attrflow_core::Verdict). Ordinary validation failure is a
//! failing verdict; an `Err` means the comparator itself is misconfigured.
//!
//! - [`comparator`]: the [`Comparator`] contract, its context and the registry
//! - [`basic`]: equality, ordering, similarity, pattern and length checks
//! - [`existence`]: lookups of other objects through the search collaborator
//! - [`acl`]: structural checks of ACL entries and role definitions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acl;
pub mod basic;
pub mod comparator;
pub mod existence;

pub use acl::{IsAclRole, IsAclSet};
pub use basic::{
    similarity, Equals, Greater, IsUniqueValue, IsValidHostName, IsValidMailAddress, IsValidUrl,
    Like, NotEquals, RegEx, Smaller, StringLength,
};
pub use comparator::{CheckContext, Comparator, ComparatorRegistry};
pub use existence::{IsExistingDn, IsExistingDnOfType, ObjectWithPropertyExists};
