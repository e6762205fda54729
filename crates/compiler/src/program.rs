//! Compiled programs
//!
//! A [`Program`] is a flat, 1-based sequence of [`Instruction`]s. Names are
//! resolved to handles at compile time, so running a program never touches
//! a registry. Address `len + 1` is the halt address.

use std::fmt;
use std::sync::Arc;

use attrflow_filters::Filter;
use attrflow_validators::Comparator;

use crate::ast::Combinator;

/// Program address, 1-based
pub type Address = usize;

/// One step of a program
#[derive(Clone)]
pub enum Instruction {
    /// Run a filter against the working key
    Filter {
        /// Registry name, kept for tracing and equality
        name: String,
        /// Resolved filter
        handle: Arc<dyn Filter>,
        /// Positional parameters
        params: Vec<String>,
    },
    /// Run a comparator and push its outcome
    Condition {
        /// Registry name, kept for tracing and equality
        name: String,
        /// Resolved comparator
        handle: Arc<dyn Comparator>,
        /// Positional parameters
        params: Vec<String>,
    },
    /// Pop two outcomes, push their combination
    Operator(Combinator),
    /// Pop one outcome and branch on it
    JumpConditional {
        /// Target when the outcome holds
        on_true: Address,
        /// Target otherwise
        on_false: Address,
    },
    /// Continue at a fixed address
    JumpUnconditional {
        /// Target
        to: Address,
    },
}

impl Instruction {
    /// Jump targets this instruction may transfer control to
    pub fn targets(&self) -> Vec<Address> {
        match self {
            Instruction::JumpConditional { on_true, on_false } => vec![*on_true, *on_false],
            Instruction::JumpUnconditional { to } => vec![*to],
            _ => Vec::new(),
        }
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        use Instruction::*;
        match (self, other) {
            (
                Filter { name: a, params: pa, .. },
                Filter { name: b, params: pb, .. },
            ) => a == b && pa == pb,
            (
                Condition { name: a, params: pa, .. },
                Condition { name: b, params: pb, .. },
            ) => a == b && pa == pb,
            (Operator(a), Operator(b)) => a == b,
            (
                JumpConditional { on_true: ta, on_false: fa },
                JumpConditional { on_true: tb, on_false: fb },
            ) => ta == tb && fa == fb,
            (JumpUnconditional { to: a }, JumpUnconditional { to: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Instruction {}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Filter { name, params, .. } => f
                .debug_struct("Filter")
                .field("name", name)
                .field("params", params)
                .finish(),
            Instruction::Condition { name, params, .. } => f
                .debug_struct("Condition")
                .field("name", name)
                .field("params", params)
                .finish(),
            Instruction::Operator(op) => f.debug_tuple("Operator").field(op).finish(),
            Instruction::JumpConditional { on_true, on_false } => f
                .debug_struct("JumpConditional")
                .field("on_true", on_true)
                .field("on_false", on_false)
                .finish(),
            Instruction::JumpUnconditional { to } => {
                f.debug_struct("JumpUnconditional").field("to", to).finish()
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Filter { name, params, .. } => write!(f, "FILTER {}({})", name, params.join(", ")),
            Instruction::Condition { name, params, .. } => write!(f, "COND {}({})", name, params.join(", ")),
            Instruction::Operator(op) => write!(f, "OP {}", op),
            Instruction::JumpConditional { on_true, on_false } => write!(f, "JCOND {} {}", on_true, on_false),
            Instruction::JumpUnconditional { to } => write!(f, "JUMP {}", to),
        }
    }
}

/// Immutable compiled program
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub(crate) fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Program { instructions }
    }

    /// Instruction at a 1-based address
    pub fn get(&self, address: Address) -> Option<&Instruction> {
        address
            .checked_sub(1)
            .and_then(|index| self.instructions.get(index))
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// No instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Address one past the last instruction
    pub fn halt_address(&self) -> Address {
        self.instructions.len() + 1
    }

    /// Instructions with their addresses
    pub fn iter(&self) -> impl Iterator<Item = (Address, &Instruction)> {
        self.instructions.iter().enumerate().map(|(i, ins)| (i + 1, ins))
    }

    /// Every jump target in program order
    pub fn jump_targets(&self) -> Vec<Address> {
        self.instructions.iter().flat_map(Instruction::targets).collect()
    }

    /// Contains only conditions and control flow
    pub fn is_condition_only(&self) -> bool {
        !self
            .instructions
            .iter()
            .any(|ins| matches!(ins, Instruction::Filter { .. }))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (address, instruction) in self.iter() {
            writeln!(f, "{:>4}  {}", address, instruction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_based_addressing() {
        let program = Program::from_instructions(vec![
            Instruction::Operator(Combinator::And),
            Instruction::JumpUnconditional { to: 3 },
        ]);
        assert!(program.get(0).is_none());
        assert_eq!(program.get(1), Some(&Instruction::Operator(Combinator::And)));
        assert_eq!(program.get(2), Some(&Instruction::JumpUnconditional { to: 3 }));
        assert!(program.get(3).is_none());
        assert_eq!(program.halt_address(), 3);
        assert_eq!(program.jump_targets(), vec![3]);
    }

    #[test]
    fn test_display_listing() {
        let program = Program::from_instructions(vec![
            Instruction::JumpConditional { on_true: 2, on_false: 3 },
            Instruction::Operator(Combinator::Or),
        ]);
        let listing = program.to_string();
        assert!(listing.contains("   1  JCOND 2 3"));
        assert!(listing.contains("   2  OP or"));
    }
}
