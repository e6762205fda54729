//! Lowering of rule trees into programs
//!
//! Recursive descent over the tree, left to right and depth first. Jumps are
//! emitted as placeholders and backpatched once the lengths of both branches
//! are known.

use std::sync::Arc;

use attrflow_core::{Error, Result};
use attrflow_filters::FilterRegistry;
use attrflow_validators::ComparatorRegistry;
use tracing::{debug, trace};

use crate::ast::{Choice, ConditionChain, FilterChain, FilterEntry, When};
use crate::program::{Address, Instruction, Program};

/// Targets of the two jumps a `When` block emits
///
/// Layout starting at the conditional jump `jump_addr`:
/// `[jump] [then; then_len] [jump end] [else; else_len]`.
/// Returns `(on_true, on_false, end)`.
pub fn branch_targets(jump_addr: Address, then_len: usize, else_len: usize) -> (Address, Address, Address) {
    let on_true = jump_addr + 1;
    let on_false = on_true + then_len + 1;
    let end = on_false + else_len;
    (on_true, on_false, end)
}

/// Compiles rule trees against a pair of registries
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'r> {
    filters: &'r FilterRegistry,
    comparators: &'r ComparatorRegistry,
}

impl<'r> Compiler<'r> {
    /// Compiler resolving names through the given registries
    pub fn new(filters: &'r FilterRegistry, comparators: &'r ComparatorRegistry) -> Self {
        Compiler { filters, comparators }
    }

    /// Compile a filter chain
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for unknown filter or comparator names.
    pub fn compile(&self, chain: &FilterChain) -> Result<Program> {
        let mut out = Vec::new();
        self.emit_chain(chain, &mut out)?;
        let program = Program::from_instructions(out);
        debug!(instructions = program.len(), "compiled rule program");
        trace!(listing = %program, "program listing");
        Ok(program)
    }

    /// Compile a bare condition into a condition-only program
    ///
    /// Used for attribute validators, whose rules carry no filters.
    ///
    /// # Errors
    ///
    /// [`Error::SchemaConfiguration`] for unknown comparator names.
    pub fn compile_condition(&self, condition: &ConditionChain) -> Result<Program> {
        let mut out = Vec::new();
        self.emit_condition(condition, &mut out)?;
        Ok(Program::from_instructions(out))
    }

    fn emit_chain(&self, chain: &FilterChain, out: &mut Vec<Instruction>) -> Result<()> {
        for entry in chain.entries() {
            match entry {
                FilterEntry::Filter { name, params } => {
                    let handle = Arc::clone(self.filters.require(name)?);
                    out.push(Instruction::Filter {
                        name: name.clone(),
                        handle,
                        params: params.clone(),
                    });
                }
                FilterEntry::Choice(choice) => self.emit_choice(choice, out)?,
            }
        }
        Ok(())
    }

    fn emit_choice(&self, choice: &Choice, out: &mut Vec<Instruction>) -> Result<()> {
        for when in &choice.0 {
            self.emit_when(when, out)?;
        }
        Ok(())
    }

    fn emit_when(&self, when: &When, out: &mut Vec<Instruction>) -> Result<()> {
        self.emit_condition(&when.condition, out)?;

        let jump_index = out.len();
        out.push(Instruction::JumpConditional { on_true: 0, on_false: 0 });

        let then_start = out.len();
        self.emit_chain(&when.then, out)?;
        let then_len = out.len() - then_start;

        let skip_index = out.len();
        out.push(Instruction::JumpUnconditional { to: 0 });

        let else_start = out.len();
        if let Some(otherwise) = &when.otherwise {
            self.emit_chain(otherwise, out)?;
        }
        let else_len = out.len() - else_start;

        let (on_true, on_false, end) = branch_targets(jump_index + 1, then_len, else_len);
        patch(out, jump_index, Instruction::JumpConditional { on_true, on_false })?;
        patch(out, skip_index, Instruction::JumpUnconditional { to: end })?;
        Ok(())
    }

    fn emit_condition(&self, condition: &ConditionChain, out: &mut Vec<Instruction>) -> Result<()> {
        match condition {
            ConditionChain::Condition { name, params } => {
                let handle = Arc::clone(self.comparators.require(name)?);
                out.push(Instruction::Condition {
                    name: name.clone(),
                    handle,
                    params: params.clone(),
                });
            }
            ConditionChain::Operator { op, left, right } => {
                self.emit_condition(left, out)?;
                self.emit_condition(right, out)?;
                out.push(Instruction::Operator(*op));
            }
        }
        Ok(())
    }
}

fn patch(out: &mut [Instruction], index: usize, instruction: Instruction) -> Result<()> {
    let slot = out
        .get_mut(index)
        .ok_or_else(|| Error::schema(format!("jump placeholder {} out of range", index + 1)))?;
    *slot = instruction;
    Ok(())
}
