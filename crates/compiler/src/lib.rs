//! Rule compiler for attrflow
//!
//! Turns a nested rule definition ([`ast`]) into a flat, jump-addressed
//! [`Program`] that the executor runs. Filter and comparator names are
//! resolved to handles here, once, at schema load time.
//!
//! ```text
//! FilterChain ── Compiler::compile ──▶ Program (1-based, halt = len + 1)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod program;

#[cfg(test)]
mod tests;

pub use ast::{Choice, Combinator, ConditionChain, FilterChain, FilterEntry, When};
pub use compiler::{branch_targets, Compiler};
pub use program::{Address, Instruction, Program};
