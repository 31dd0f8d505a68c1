// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Summaries recording which integer values each output can take.
//!
//! The monitored variables are the integer globals a procedure modifies and
//! its integer out-parameters. A variable whose set of observed values grows
//! past the bound is no longer constrained.

use crate::domain::{current_term, current_value, RenderContext, State, SummaryDomain};
use crate::{InferenceError, InferenceOptions, Result};
use itertools::Itertools;
use num_bigint::BigInt;
use std::collections::BTreeSet;
use std::fmt;
use vc_ast::{Expr, Implementation, InternedString, Program, Type};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    /// No end-state has been seen yet.
    Unobserved,
    Values(BTreeSet<BigInt>),
    /// Too many values to be worth tracking.
    Unconstrained,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantSummary {
    vars: Vec<(InternedString, Observed)>,
}

impl ConstantSummary {
    pub fn observed(&self, name: &str) -> Option<&Observed> {
        self.vars.iter().find(|(v, _)| *v == name).map(|(_, o)| o)
    }

    pub fn variables(&self) -> impl Iterator<Item = InternedString> + '_ {
        self.vars.iter().map(|(v, _)| *v)
    }

    fn is_bottom(&self) -> bool {
        self.vars.iter().any(|(_, o)| *o == Observed::Unobserved)
    }
}

impl fmt::Display for ConstantSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "false");
        }
        let mut first = true;
        for (var, observed) in &self.vars {
            let Observed::Values(values) = observed else { continue };
            if !first {
                write!(f, " && ")?;
            }
            first = false;
            write!(f, "({})", values.iter().map(|c| format!("{var} == {c}")).join(" || "))?;
        }
        if first {
            write!(f, "true")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ConstantSet {
    bound: usize,
}

impl ConstantSet {
    pub fn new(bound: usize) -> Self {
        ConstantSet { bound }
    }

    /// A domain tracking up to `options.constant_bound` values per variable.
    pub fn from_options(options: &InferenceOptions) -> Self {
        ConstantSet::new(options.constant_bound)
    }
}

impl SummaryDomain for ConstantSet {
    type Summary = ConstantSummary;

    fn bottom(&self, program: &Program, implementation: &Implementation) -> Result<ConstantSummary> {
        let procedure = program.procedure(implementation.name).ok_or_else(|| {
            InferenceError::Internal(format!("no procedure for `{}`", implementation.name))
        })?;
        let modified = procedure.modifies.iter().filter_map(|g| program.global(*g));
        let mut vars: Vec<(InternedString, Observed)> = Vec::new();
        for var in modified.chain(&implementation.out_params) {
            if var.typ == Type::Int && !vars.iter().any(|(v, _)| *v == var.name) {
                vars.push((var.name, Observed::Unobserved));
            }
        }
        Ok(ConstantSummary { vars })
    }

    fn join(&self, summary: &ConstantSummary, state: &State) -> Result<ConstantSummary> {
        let mut vars = Vec::with_capacity(summary.vars.len());
        for (var, observed) in &summary.vars {
            let value = current_value(state, *var)
                .ok_or_else(|| InferenceError::Internal(format!("state has no value for `{var}`")))?;
            let value = value.as_int().cloned().ok_or_else(|| {
                InferenceError::Internal(format!("`{var}` has the non-integer value {value}"))
            })?;
            let observed = match observed {
                Observed::Unobserved => Observed::Values(BTreeSet::from([value])),
                Observed::Values(values) => {
                    let mut values = values.clone();
                    values.insert(value);
                    if values.len() > self.bound {
                        Observed::Unconstrained
                    } else {
                        Observed::Values(values)
                    }
                }
                Observed::Unconstrained => Observed::Unconstrained,
            };
            vars.push((*var, observed));
        }
        Ok(ConstantSummary { vars })
    }

    fn render(&self, summary: &ConstantSummary, context: &RenderContext) -> Result<Expr> {
        if summary.is_bottom() {
            return Ok(Expr::bool_false());
        }
        let mut conjuncts = Vec::new();
        for (var, observed) in &summary.vars {
            let Observed::Values(values) = observed else { continue };
            let term = current_term(context, *var).ok_or_else(|| {
                InferenceError::Internal(format!("`{var}` is not mapped at this site"))
            })?;
            conjuncts
                .push(Expr::or_any(values.iter().map(|c| term.clone().eq(Expr::int_constant(c.clone())))));
        }
        Ok(Expr::and_all(conjuncts))
    }
}
