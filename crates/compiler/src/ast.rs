//! Rule definition tree
//!
//! Rules are declared in schema data files as nested filter chains with
//! conditional branches. The tree deserializes from JSON:
//!
//! ```json
//! [
//!   {"filter": {"name": "SplitString", "params": [","]}},
//!   {"choice": [{
//!     "condition": {"operator": {
//!       "op": "and",
//!       "left":  {"condition": {"name": "Equals", "params": ["x"]}},
//!       "right": {"condition": {"name": "Greater", "params": ["3"]}}
//!     }},
//!     "then": [{"filter": {"name": "Clear"}}],
//!     "else": [{"filter": {"name": "SetValue", "params": ["y"]}}]
//!   }]}
//! ]
//! ```

use serde::{Deserialize, Serialize};

/// Ordered sequence of filter entries
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterChain(pub Vec<FilterEntry>);

impl FilterChain {
    /// Chain from entries
    pub fn new(entries: Vec<FilterEntry>) -> Self {
        FilterChain(entries)
    }

    /// Entries in order
    pub fn entries(&self) -> &[FilterEntry] {
        &self.0
    }

    /// No entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One element of a filter chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterEntry {
    /// Named filter call
    Filter {
        /// Filter name
        name: String,
        /// Positional parameters
        #[serde(default)]
        params: Vec<String>,
    },
    /// Conditional branches
    Choice(Choice),
}

impl FilterEntry {
    /// Filter call entry
    pub fn filter(name: impl Into<String>, params: &[&str]) -> Self {
        FilterEntry::Filter {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Sequence of conditional blocks, compiled one after the other
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Choice(pub Vec<When>);

/// Condition with a branch taken when it holds and an optional other branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct When {
    /// Condition to evaluate
    pub condition: ConditionChain,
    /// Filters run when the condition holds
    pub then: FilterChain,
    /// Filters run otherwise
    #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<FilterChain>,
}

impl When {
    /// Block without an else branch
    pub fn new(condition: ConditionChain, then: FilterChain) -> Self {
        When {
            condition,
            then,
            otherwise: None,
        }
    }

    /// Builder: set the else branch
    pub fn otherwise(mut self, chain: FilterChain) -> Self {
        self.otherwise = Some(chain);
        self
    }
}

/// Boolean combination of comparator calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionChain {
    /// Named comparator call
    Condition {
        /// Comparator name
        name: String,
        /// Positional parameters
        #[serde(default)]
        params: Vec<String>,
    },
    /// Two sub-conditions joined by a combinator
    Operator {
        /// How the two results combine
        op: Combinator,
        /// Left operand
        left: Box<ConditionChain>,
        /// Right operand
        right: Box<ConditionChain>,
    },
}

impl ConditionChain {
    /// Comparator call
    pub fn condition(name: impl Into<String>, params: &[&str]) -> Self {
        ConditionChain::Condition {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Both sides hold
    pub fn and(left: ConditionChain, right: ConditionChain) -> Self {
        ConditionChain::Operator {
            op: Combinator::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Either side holds
    pub fn or(left: ConditionChain, right: ConditionChain) -> Self {
        ConditionChain::Operator {
            op: Combinator::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Boolean combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Logical and
    And,
    /// Logical or
    Or,
}

impl Combinator {
    /// Combine two results
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            Combinator::And => left && right,
            Combinator::Or => left || right,
        }
    }
}

impl std::fmt::Display for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Combinator::And => write!(f, "and"),
            Combinator::Or => write!(f, "or"),
        }
    }
}
