//! # attrflow Executor
//!
//! Runs compiled rule programs against an object's value table.
//!
//! - [`Executor::execute`] runs filter programs in either direction (after
//!   load and before save) and returns the final working key.
//! - [`Executor::evaluate`] runs condition-only validator programs and
//!   returns a [`Verdict`](attrflow_core::Verdict).
//!
//! ## Machine model
//!
//! | Instruction | Effect |
//! |-------------|--------|
//! | `Filter` | mutate the table, maybe switch the working key |
//! | `Condition` | push the comparator outcome |
//! | `Operator` | pop two, push the combination |
//! | `JumpConditional` | pop one, branch |
//! | `JumpUnconditional` | jump |
//!
//! The run ends when the program counter passes the last instruction.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod executor;

#[cfg(test)]
mod tests;

pub use executor::{Executor, Outcome};
