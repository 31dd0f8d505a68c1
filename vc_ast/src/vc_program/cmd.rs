// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Expr, Variable};
use crate::InternedString;
use std::collections::BTreeMap;

/// The expression currently standing for each variable at a program point:
/// an incarnation, a literal, or a variable whose initial value is still
/// current. Variables without an entry denote themselves.
pub type IncarnationMap = BTreeMap<InternedString, Expr>;

/// Where an assertion comes from. Counterexample reporting uses this to blame
/// the right contract clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssertKind {
    /// An assertion written in the body
    Plain,
    /// A precondition of `callee`, checked at a call site
    Requires { callee: InternedString },
    /// A postcondition, checked at the exit of the implementation
    Ensures { error_data: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssertCmd {
    pub condition: Expr,
    pub kind: AssertKind,
    /// Filled in by passification: the condition before substitution.
    pub original: Option<Expr>,
    /// Filled in by passification: the incarnations in scope at the assertion.
    pub incarnation_map: Option<IncarnationMap>,
}

impl AssertCmd {
    pub fn new(condition: Expr, kind: AssertKind) -> Self {
        AssertCmd { condition, kind, original: None, incarnation_map: None }
    }
}

/// Commands of a basic block
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cmd {
    /// `assert condition;`
    Assert(AssertCmd),

    /// `assume condition;`
    Assume { condition: Expr },

    /// Simultaneous assignment: `x, y := e1, e2;`
    Assign { pairs: Vec<(InternedString, Expr)> },

    /// `havoc x, y;`
    Havoc { vars: Vec<InternedString> },

    /// `call outputs := callee(arguments);`
    Call { callee: InternedString, arguments: Vec<Expr>, outputs: Vec<InternedString> },

    /// Ignored by every analysis
    Comment(String),

    /// A nested declaration scope: `{ var locals; cmds }`
    Scope { locals: Vec<Variable>, cmds: Vec<Cmd> },
}

impl Cmd {
    pub fn assert(condition: Expr) -> Self {
        Cmd::Assert(AssertCmd::new(condition, AssertKind::Plain))
    }

    pub fn assert_ensures(condition: Expr, error_data: Option<String>) -> Self {
        Cmd::Assert(AssertCmd::new(condition, AssertKind::Ensures { error_data }))
    }

    pub fn assume(condition: Expr) -> Self {
        Cmd::Assume { condition }
    }

    pub fn assign(lhs: InternedString, rhs: Expr) -> Self {
        Cmd::Assign { pairs: vec![(lhs, rhs)] }
    }

    pub fn havoc(vars: Vec<InternedString>) -> Self {
        Cmd::Havoc { vars }
    }

    pub fn call(
        callee: InternedString,
        arguments: Vec<Expr>,
        outputs: Vec<InternedString>,
    ) -> Self {
        Cmd::Call { callee, arguments, outputs }
    }

    pub fn comment<T: Into<String>>(text: T) -> Self {
        Cmd::Comment(text.into())
    }

    /// Passive commands only constrain state: they never update it.
    pub fn is_passive(&self) -> bool {
        matches!(self, Cmd::Assert(_) | Cmd::Assume { .. })
    }

    /// Names of the procedures called by this command, nested scopes included.
    pub fn callees(&self, out: &mut Vec<InternedString>) {
        match self {
            Cmd::Call { callee, .. } => out.push(*callee),
            Cmd::Scope { cmds, .. } => cmds.iter().for_each(|c| c.callees(out)),
            _ => {}
        }
    }

    /// Rename the variables this command reads and writes. Written variables
    /// are renamed only when `map` sends them to another symbol.
    pub fn substitute(&self, map: &dyn Fn(InternedString) -> Option<Expr>) -> Cmd {
        let rename = |name: InternedString| map(name).and_then(|e| e.as_symbol()).unwrap_or(name);
        match self {
            Cmd::Assert(a) => Cmd::Assert(AssertCmd {
                condition: a.condition.substitute(map),
                kind: a.kind.clone(),
                original: a.original.clone(),
                incarnation_map: a.incarnation_map.clone(),
            }),
            Cmd::Assume { condition } => Cmd::assume(condition.substitute(map)),
            Cmd::Assign { pairs } => Cmd::Assign {
                pairs: pairs.iter().map(|(lhs, rhs)| (rename(*lhs), rhs.substitute(map))).collect(),
            },
            Cmd::Havoc { vars } => Cmd::havoc(vars.iter().map(|v| rename(*v)).collect()),
            Cmd::Call { callee, arguments, outputs } => Cmd::call(
                *callee,
                arguments.iter().map(|a| a.substitute(map)).collect(),
                outputs.iter().map(|o| rename(*o)).collect(),
            ),
            Cmd::Comment(_) => self.clone(),
            Cmd::Scope { locals, cmds } => Cmd::Scope {
                locals: locals.clone(),
                cmds: cmds.iter().map(|c| c.substitute(map)).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_renames_targets() {
        let cmd = Cmd::Assign {
            pairs: vec![("r".into(), Expr::symbol("x").plus(Expr::int_constant(1)))],
        };
        let map = |n: InternedString| {
            if n == "r" {
                Some(Expr::symbol("out"))
            } else if n == "x" {
                Some(Expr::symbol("in"))
            } else {
                None
            }
        };
        let expected = Cmd::Assign {
            pairs: vec![("out".into(), Expr::symbol("in").plus(Expr::int_constant(1)))],
        };
        assert_eq!(cmd.substitute(&map), expected);
    }

    #[test]
    fn callees_are_found_in_nested_scopes() {
        let cmd = Cmd::Scope {
            locals: vec![],
            cmds: vec![Cmd::comment("nested"), Cmd::call("P".into(), vec![], vec![])],
        };
        let mut callees = vec![];
        cmd.callees(&mut callees);
        assert_eq!(callees, vec![InternedString::from("P")]);
    }
}
