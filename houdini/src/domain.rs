// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interface between the fixpoint engine and abstract domains.

use crate::{InferenceError, Result};
use std::collections::BTreeMap;
use std::fmt;
use vc_ast::{EvalError, Expr, Implementation, InternedString, Program, Valuation, Value};

/// Concrete end-state of an implementation, keyed by `old(<g>)` for the entry
/// value of every global and by plain names for parameters and modified
/// globals.
pub type State = BTreeMap<InternedString, Value>;

/// The terms that the names of a [State] stand for at one summary placeholder.
pub type RenderContext = BTreeMap<InternedString, Expr>;

/// A lattice of procedure summaries.
///
/// `bottom` admits no end-state and `join` must only ever weaken a summary:
/// every state admitted by `summary` is admitted by `join(summary, state)`,
/// and so is `state` itself.
pub trait SummaryDomain {
    type Summary: Clone + PartialEq + fmt::Debug + fmt::Display;

    fn bottom(&self, program: &Program, implementation: &Implementation) -> Result<Self::Summary>;

    fn join(&self, summary: &Self::Summary, state: &State) -> Result<Self::Summary>;

    /// The summary as a formula over the terms of `context`.
    fn render(&self, summary: &Self::Summary, context: &RenderContext) -> Result<Expr>;
}

/// Current value of `name`. Globals an implementation does not modify only
/// carry their entry value.
fn lookup<T: Clone>(map: &BTreeMap<InternedString, T>, name: InternedString) -> Option<T> {
    map.get(&name).or_else(|| map.get(&name.old_name())).cloned()
}

pub(crate) fn current_value(state: &State, name: InternedString) -> Option<Value> {
    lookup(state, name)
}

pub(crate) fn current_term(context: &RenderContext, name: InternedString) -> Option<Expr> {
    lookup(context, name)
}

/// Evaluation over a [State].
pub(crate) struct StateValuation<'a>(pub(crate) &'a State);

impl Valuation for StateValuation<'_> {
    fn symbol(&self, name: InternedString) -> Option<Value> {
        lookup(self.0, name)
    }

    fn old(&self, name: InternedString) -> Option<Value> {
        self.0.get(&name.old_name()).cloned()
    }
}

pub(crate) fn evaluate_bool(expr: &Expr, state: &State) -> Result<bool> {
    let internal = |e: EvalError| InferenceError::Internal(format!("cannot evaluate `{expr}`: {e}"));
    match expr.evaluate(&StateValuation(state)).map_err(internal)? {
        Value::Bool(b) => Ok(b),
        Value::Int(_) => Err(InferenceError::Internal(format!("`{expr}` is not a predicate"))),
    }
}

/// `expr` with its variables replaced by the terms of `context`.
pub(crate) fn instantiate(expr: &Expr, context: &RenderContext) -> Result<Expr> {
    let unmapped = expr
        .free_symbols()
        .into_iter()
        .find(|n| lookup(context, *n).is_none())
        .or_else(|| expr.old_symbols().into_iter().find(|n| !context.contains_key(&n.old_name())));
    if let Some(name) = unmapped {
        return Err(InferenceError::Internal(format!("`{name}` is not mapped at this site")));
    }
    let old = |n: InternedString| context.get(&n.old_name()).cloned();
    Ok(expr.substitute_replacing_old(&|n| lookup(context, n), &old))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmodified_globals_read_their_entry_value() {
        let state: State =
            [(InternedString::from("g").old_name(), Value::Bool(true)), ("r".into(), Value::Bool(false))].into();
        let valuation = StateValuation(&state);
        assert_eq!(valuation.symbol("g".into()), Some(Value::Bool(true)));
        assert_eq!(valuation.old("g".into()), Some(Value::Bool(true)));
        assert_eq!(valuation.old("r".into()), None);
        assert!(evaluate_bool(&Expr::symbol("g").and(!Expr::symbol("r")), &state).unwrap());
    }

    #[test]
    fn instantiation_replaces_old_reads() {
        let context: RenderContext = [
            (InternedString::from("g").old_name(), Expr::symbol("call0oldg")),
            ("g".into(), Expr::symbol("g@1")),
        ]
        .into();
        let pred = Expr::symbol("g").gt(Expr::symbol("g").old());
        assert_eq!(
            instantiate(&pred, &context).unwrap(),
            Expr::symbol("g@1").gt(Expr::symbol("call0oldg"))
        );
        assert!(matches!(
            instantiate(&Expr::symbol("h"), &context),
            Err(InferenceError::Internal(_))
        ));
    }
}
