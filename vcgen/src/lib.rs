// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Verification condition generation for loop-free implementations.
//!
//! An implementation goes through the following steps before it becomes a
//! formula:
//!  1. Calls are replaced by the contract of the callee.
//!  2. All returning blocks are joined into a single exit.
//!  3. Postconditions are asserted at the exit and preconditions are assumed
//!     in a fresh entry block.
//!  4. Critical edges into join points are split.
//!  5. The body is passified: every assignment and havoc is replaced by an
//!     assumption over fresh incarnations.
//!  6. The weakest precondition of the passive graph is computed.

mod calls;
mod contracts;
mod liveness;
mod options;
mod passify;
mod unify;
mod wp;

pub use options::{VcEncoding, VcGenOptions};
pub use passify::{IncarnationOrigin, PassiveImplementation};

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, trace};
use vc_ast::{Expr, GraphError, Implementation, InternedString, Program, VerificationCondition};

#[derive(Debug, Error)]
pub enum VcGenError {
    /// The block graph is not a well-formed loop-free body.
    #[error("implementation `{implementation}` is malformed: {reason}")]
    StructuralViolation {
        implementation: InternedString,
        #[source]
        reason: GraphError,
    },
    /// An inconsistency that should have been ruled out by earlier stages,
    /// e.g. an undeclared variable or a call that was never desugared.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VcGenError {
    pub(crate) fn structural(implementation: InternedString, reason: GraphError) -> Self {
        VcGenError::StructuralViolation { implementation, reason }
    }
}

pub type Result<T> = std::result::Result<T, VcGenError>;

/// Turns implementations of `program` into passive form and then into
/// verification conditions.
pub struct VcGenerator<'a> {
    program: &'a Program,
    options: VcGenOptions,
}

impl<'a> VcGenerator<'a> {
    pub fn new(program: &'a Program, options: VcGenOptions) -> Self {
        VcGenerator { program, options }
    }

    pub fn options(&self) -> &VcGenOptions {
        &self.options
    }

    /// Run the whole pre-VC pipeline on a copy of `implementation`.
    pub fn passify_implementation(
        &self,
        implementation: &Implementation,
    ) -> Result<PassiveImplementation> {
        let name = implementation.name;
        let procedure = self.program.procedure(name).ok_or_else(|| {
            VcGenError::Internal(format!("no procedure declared for implementation `{name}`"))
        })?;
        implementation.validate().map_err(|reason| VcGenError::structural(name, reason))?;

        let mut imp = implementation.clone();
        calls::desugar_calls(self.program, &mut imp)?;
        let (exit, goto_origins) =
            unify::unify_exits(&mut imp).map_err(|reason| VcGenError::structural(name, reason))?;
        let exit = contracts::inject_postconditions(procedure, &mut imp, exit)?;
        contracts::inject_preconditions(procedure, &mut imp)?;
        imp.validate().map_err(|reason| VcGenError::structural(name, reason))?;
        let split = unify::split_critical_edges(&mut imp);
        debug!(implementation = %name, split, "prepared block graph");

        let mut passifier = passify::Passifier::new(self.program, procedure, &imp, &self.options);
        let (order, passive_exit, exit_map) = passifier.passify(&mut imp)?;
        if passive_exit != exit {
            return Err(VcGenError::Internal(format!(
                "`{name}` returns from {passive_exit}, expected {exit}"
            )));
        }
        if self.options.trace_passive {
            trace!("passive form of `{name}`:\n{imp}");
        }
        Ok(PassiveImplementation {
            implementation: imp,
            order,
            exit,
            exit_map,
            incarnation_origins: passifier.into_origins(),
            goto_origins,
        })
    }

    /// The closed formula stating that every assertion of `passive` holds on
    /// every path, together with declarations for its symbols.
    pub fn generate_vc(&self, passive: &PassiveImplementation) -> Result<VerificationCondition> {
        let imp = &passive.implementation;
        let (formula, block_symbols) = wp::encode(imp, &passive.order, self.options.encoding)?;

        let mut names: BTreeSet<InternedString> = formula.free_symbols();
        names.extend(formula.old_symbols());
        let mut symbols = Vec::with_capacity(names.len());
        for name in names {
            if let Some((_, typ)) = block_symbols.iter().find(|(n, _)| *n == name) {
                symbols.push((name, typ.clone()));
            } else if let Some(var) = imp.variable(name).or_else(|| self.program.global(name)) {
                symbols.push((name, var.typ.clone()));
            } else {
                return Err(VcGenError::Internal(format!(
                    "symbol `{name}` in the condition of `{}` is not declared",
                    imp.name
                )));
            }
        }

        let mut applied = Vec::new();
        formula.visit(&mut |e| {
            if let Expr::FunctionCall { symbol, .. } = e {
                if !applied.contains(symbol) {
                    applied.push(*symbol);
                }
            }
        });
        let functions = applied
            .into_iter()
            .map(|f| {
                self.program.function(f).cloned().ok_or_else(|| {
                    VcGenError::Internal(format!("function `{f}` is applied but not declared"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(implementation = %imp.name, symbols = symbols.len(), "generated verification condition");
        let block_variables = block_symbols.into_iter().map(|(n, _)| n).collect();
        Ok(VerificationCondition { name: imp.name, formula, symbols, functions, block_variables })
    }

    /// Passify `implementation` and generate its verification condition.
    pub fn verification_condition(
        &self,
        implementation: &Implementation,
    ) -> Result<(PassiveImplementation, VerificationCondition)> {
        let passive = self.passify_implementation(implementation)?;
        let vc = self.generate_vc(&passive)?;
        Ok((passive, vc))
    }
}
