//! The Executor - a small stack machine for rule programs.
//!
//! The Executor is stateless between runs: every call gets a fresh program
//! counter and boolean stack, and all state lives in the value table it is
//! handed.

use attrflow_compiler::{Address, Instruction, Program};
use attrflow_core::{Error, Result, Value, ValueTable, Verdict};
use attrflow_filters::FilterContext;
use attrflow_validators::CheckContext;
use tracing::{debug, trace};

/// Outcome of one program run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Working key when the program halted
    pub key: String,
    /// Top of the condition stack at halt, `true` when empty
    pub result: bool,
    /// Records of the conditions that failed along the way
    pub errors: Vec<attrflow_core::ErrorRecord>,
}

impl Outcome {
    /// Verdict view: errors are only reported when the result is false
    pub fn verdict(self) -> Verdict {
        if self.result {
            Verdict::pass()
        } else {
            Verdict::fail_all(self.errors)
        }
    }
}

/// The program interpreter.
///
/// # Thread Safety
///
/// Executor is `Copy` and borrows everything it needs; programs are shared
/// read-only, so any number of executors may run the same program.
///
/// # Example
///
/// ```ignore
/// let ctx = FilterContext::new(&object, &env, &types, &settings);
/// let key = Executor::new(ctx).execute(&program, "uid", &mut table)?;
/// ```
#[derive(Clone, Copy)]
pub struct Executor<'a> {
    ctx: FilterContext<'a>,
}

impl<'a> Executor<'a> {
    /// Create an executor for one object
    pub fn new(ctx: FilterContext<'a>) -> Self {
        Self { ctx }
    }

    /// Run a filter program on attribute `key`.
    ///
    /// Conditions inspect the current values of the working key. Returns the
    /// working key at halt, which differs from `key` when a filter switched
    /// it.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownAttribute`] when `key` is not in the table
    /// - [`Error::SchemaConfiguration`] on stack underflow or a jump outside
    ///   the program
    /// - any filter or comparator error, which aborts the run
    pub fn execute(&self, program: &Program, key: &str, table: &mut ValueTable) -> Result<String> {
        table.require(key)?;
        let outcome = self.run(program, key, table, None)?;
        debug!(
            object = %self.ctx.object.uuid,
            attribute = key,
            final_key = %outcome.key,
            "program finished"
        );
        Ok(outcome.key)
    }

    /// Evaluate a condition program against `values` of attribute `key`.
    ///
    /// `attributes` is the read-only snapshot comparators may consult. The
    /// verdict carries the records of every failed condition when the final
    /// result is false.
    ///
    /// # Errors
    ///
    /// - [`Error::SchemaConfiguration`] when the program contains filters,
    ///   underflows its stack or jumps outside itself
    /// - comparator misconfiguration
    pub fn evaluate(
        &self,
        program: &Program,
        key: &str,
        values: &[Value],
        attributes: &ValueTable,
    ) -> Result<Verdict> {
        if !program.is_condition_only() {
            return Err(Error::schema(format!(
                "validator program for '{}' contains filters",
                key
            )));
        }
        // Filters are absent, so the table is never written.
        let mut scratch = attributes.clone();
        let outcome = self.run(program, key, &mut scratch, Some(values))?;
        trace!(attribute = key, result = outcome.result, "validator evaluated");
        Ok(outcome.verdict())
    }

    /// Run a program and report the full outcome
    ///
    /// # Errors
    ///
    /// Same as [`Executor::execute`].
    pub fn run_program(&self, program: &Program, key: &str, table: &mut ValueTable) -> Result<Outcome> {
        table.require(key)?;
        self.run(program, key, table, None)
    }

    fn run(
        &self,
        program: &Program,
        key: &str,
        table: &mut ValueTable,
        fixed: Option<&[Value]>,
    ) -> Result<Outcome> {
        let halt = program.halt_address();
        let mut key = key.to_string();
        let mut stack: Vec<bool> = Vec::new();
        let mut errors = Vec::new();
        let mut pc: Address = 1;

        while let Some(instruction) = program.get(pc) {
            trace!(pc, instruction = %instruction, key = %key, "step");
            let mut next = pc + 1;
            match instruction {
                Instruction::Filter { handle, params, .. } => {
                    key = handle.process(&self.ctx, &key, table, params)?;
                }
                Instruction::Condition { name, handle, params } => {
                    let values = match fixed {
                        Some(values) => values.to_vec(),
                        None => table.values(&key).to_vec(),
                    };
                    let check = CheckContext::new(self.ctx.object, table, self.ctx.env);
                    let verdict = handle.process(&check, &key, &values, params)?;
                    trace!(condition = %name, ok = verdict.ok, "condition evaluated");
                    if !verdict.ok {
                        errors.extend(verdict.errors);
                    }
                    stack.push(verdict.ok);
                }
                Instruction::Operator(op) => {
                    let right = pop(&mut stack, pc)?;
                    let left = pop(&mut stack, pc)?;
                    stack.push(op.apply(left, right));
                }
                Instruction::JumpConditional { on_true, on_false } => {
                    next = if pop(&mut stack, pc)? { *on_true } else { *on_false };
                }
                Instruction::JumpUnconditional { to } => next = *to,
            }
            if next == 0 || next > halt || next <= pc {
                return Err(Error::schema(format!(
                    "instruction {} jumps to {} outside 1..={}",
                    pc, next, halt
                )));
            }
            pc = next;
        }

        Ok(Outcome {
            key,
            result: stack.last().copied().unwrap_or(true),
            errors,
        })
    }
}

fn pop(stack: &mut Vec<bool>, pc: Address) -> Result<bool> {
    stack
        .pop()
        .ok_or_else(|| Error::schema(format!("condition stack underflow at instruction {}", pc)))
}
