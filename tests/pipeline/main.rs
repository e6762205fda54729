//! Object Pipeline Tests
//!
//! End-to-end tests through the `attrflow` facade:
//! - Schema files and `attrflow.toml`
//! - Create, load, modify and remove objects
//! - In/out rules with branches, flags and dates
//! - Relation attributes and bulk import
//! - Sharing one engine between threads

mod common;

mod concurrency;
mod flags;
mod lifecycle;
mod relations;
mod rules;
mod schema_files;
