// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Cmd, Expr, Variable};
use crate::InternedString;

/// How a block of a block expression ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractExit {
    /// Jump to other blocks of the same block expression, by index.
    Goto { targets: Vec<usize> },
    /// `return e`: the value of the whole condition on this path.
    Return { value: Expr },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractBlock {
    pub label: InternedString,
    pub cmds: Vec<Cmd>,
    pub exit: ContractExit,
}

/// A condition with internal control flow. The first block is the entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockExpr {
    pub blocks: Vec<ContractBlock>,
}

/// A contract condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Expr(Expr),
    Blocks(BlockExpr),
}

impl Condition {
    /// Apply `map` to every expression and command of the condition.
    pub fn substitute(&self, map: &dyn Fn(InternedString) -> Option<Expr>) -> Condition {
        match self {
            Condition::Expr(e) => Condition::Expr(e.substitute(map)),
            Condition::Blocks(be) => Condition::Blocks(BlockExpr {
                blocks: be
                    .blocks
                    .iter()
                    .map(|b| ContractBlock {
                        label: b.label,
                        cmds: b.cmds.iter().map(|c| c.substitute(map)).collect(),
                        exit: match &b.exit {
                            ContractExit::Goto { targets } => {
                                ContractExit::Goto { targets: targets.clone() }
                            }
                            ContractExit::Return { value } => {
                                ContractExit::Return { value: value.substitute(map) }
                            }
                        },
                    })
                    .collect(),
            }),
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Condition::Expr(e) => Some(e),
            Condition::Blocks(_) => None,
        }
    }
}

impl From<Expr> for Condition {
    fn from(e: Expr) -> Self {
        Condition::Expr(e)
    }
}

/// Precondition. Free preconditions are assumed but never checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requires {
    pub condition: Condition,
    pub free: bool,
}

impl Requires {
    pub fn new<T: Into<Condition>>(condition: T) -> Self {
        Requires { condition: condition.into(), free: false }
    }

    pub fn free<T: Into<Condition>>(condition: T) -> Self {
        Requires { condition: condition.into(), free: true }
    }
}

/// Postcondition. Free postconditions are assumed at call sites but never
/// checked against the implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ensures {
    pub condition: Condition,
    pub free: bool,
    pub attributes: Vec<InternedString>,
    /// Extra text reported when the postcondition fails.
    pub error_data: Option<String>,
}

impl Ensures {
    pub fn new<T: Into<Condition>>(condition: T) -> Self {
        Ensures { condition: condition.into(), free: false, attributes: Vec::new(), error_data: None }
    }

    pub fn free<T: Into<Condition>>(condition: T) -> Self {
        Ensures { free: true, ..Ensures::new(condition) }
    }

    pub fn with_attribute<T: Into<InternedString>>(mut self, attribute: T) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| *a == attribute)
    }
}

/// Procedure declaration
/// The contract every implementation of the procedure must satisfy, and that
/// call sites rely on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Procedure {
    pub name: InternedString,
    pub in_params: Vec<Variable>,
    pub out_params: Vec<Variable>,
    pub requires: Vec<Requires>,
    pub ensures: Vec<Ensures>,
    /// Globals the procedure may update.
    pub modifies: Vec<InternedString>,
    pub attributes: Vec<InternedString>,
}

impl Procedure {
    pub fn new(name: InternedString, in_params: Vec<Variable>, out_params: Vec<Variable>) -> Self {
        Procedure {
            name,
            in_params,
            out_params,
            requires: Vec::new(),
            ensures: Vec::new(),
            modifies: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| *a == attribute)
    }
}
