// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An oracle that searches for counterexamples by enumerating small values.
//!
//! Every integer symbol ranges over `min_int..=max_int` and every boolean over
//! both values. Applications of uninterpreted functions are treated as extra
//! unknowns, one per distinct application term. Two terms whose arguments
//! evaluate to the same values share the value of the first one, which keeps
//! every interpretation a function.
//!
//! The oracle never claims more than it checked: when the search space is
//! empty or exceeds the budget, or some assignment could not be evaluated, the
//! answer is `Inconclusive` rather than `Correct`.

use crate::{ErrorHandler, Model, Outcome, ProverError, ProverOracle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use vc_ast::{EvalError, Expr, InternedString, Type, Valuation, Value, VerificationCondition};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BoundedOptions {
    pub min_int: i64,
    pub max_int: i64,
    /// Give up when the search space is larger than this.
    pub max_assignments: u64,
}

impl Default for BoundedOptions {
    fn default() -> Self {
        BoundedOptions { min_int: -4, max_int: 4, max_assignments: 1_000_000 }
    }
}

pub struct BoundedProver {
    options: BoundedOptions,
    pending: Option<(String, VerificationCondition)>,
}

/// Symbol values plus the interpretation of function applications built for
/// one assignment.
struct Assignment<'a> {
    symbols: &'a BTreeMap<InternedString, Value>,
    applications: &'a BTreeMap<(InternedString, Vec<Value>), Value>,
}

impl Valuation for Assignment<'_> {
    fn symbol(&self, name: InternedString) -> Option<Value> {
        self.symbols.get(&name).cloned()
    }

    fn application(&self, symbol: InternedString, arguments: &[Value]) -> Option<Value> {
        self.applications.get(&(symbol, arguments.to_vec())).cloned()
    }
}

impl BoundedProver {
    pub fn new(options: BoundedOptions) -> Self {
        BoundedProver { options, pending: None }
    }

    fn domain(&self, typ: &Type, what: &dyn Fn() -> String) -> Result<Vec<Value>, ProverError> {
        match typ {
            Type::Bool => Ok(vec![Value::Bool(false), Value::Bool(true)]),
            Type::Int => {
                Ok((self.options.min_int..=self.options.max_int).map(|i| Value::Int(i.into())).collect())
            }
            _ => Err(ProverError::Unsupported(format!("{} has type `{typ}`", what()))),
        }
    }

    fn check(
        &self,
        name: &str,
        vc: &VerificationCondition,
        handler: &mut dyn ErrorHandler,
    ) -> Result<Outcome, ProverError> {
        let mut domains: Vec<Vec<Value>> = Vec::new();
        for (symbol, typ) in &vc.symbols {
            domains.push(self.domain(typ, &|| format!("symbol `{symbol}`"))?);
        }

        let mut applications: Vec<(InternedString, Vec<Expr>)> = Vec::new();
        let mut nested = false;
        vc.formula.visit(&mut |e| {
            if let Expr::FunctionCall { symbol, arguments } = e {
                nested |= arguments.iter().any(|a| {
                    let mut found = false;
                    a.visit(&mut |inner| found |= matches!(inner, Expr::FunctionCall { .. }));
                    found
                });
                let application = (*symbol, arguments.clone());
                if !applications.contains(&application) {
                    applications.push(application);
                }
            }
        });
        if nested {
            return Err(ProverError::Unsupported(format!(
                "`{name}` applies a function to the result of an application"
            )));
        }
        for (symbol, _) in &applications {
            let function = vc.functions.iter().find(|f| f.name == *symbol).ok_or_else(|| {
                ProverError::Unsupported(format!("function `{symbol}` is not declared"))
            })?;
            domains.push(self.domain(&function.return_type, &|| format!("function `{symbol}`"))?);
        }

        let total = domains.iter().fold(1u64, |n, d| n.saturating_mul(d.len() as u64));
        if total == 0 {
            warn!(
                query = name,
                min_int = self.options.min_int,
                max_int = self.options.max_int,
                "integer range is empty"
            );
            return Ok(Outcome::Inconclusive);
        }
        if total > self.options.max_assignments {
            warn!(query = name, total, "search space exceeds the assignment budget");
            return Ok(Outcome::Inconclusive);
        }

        let mut inconclusive = false;
        let mut digits = vec![0usize; domains.len()];
        for _ in 0..total {
            let symbols: BTreeMap<InternedString, Value> = vc
                .symbols
                .iter()
                .zip(&digits)
                .zip(&domains)
                .map(|(((symbol, _), digit), domain)| (*symbol, domain[*digit].clone()))
                .collect();
            let mut interpretation = BTreeMap::new();
            let app_digits = digits.iter().zip(&domains).skip(vc.symbols.len());
            for ((symbol, arguments), (digit, domain)) in applications.iter().zip(app_digits) {
                let empty = BTreeMap::new();
                let only_symbols = Assignment { symbols: &symbols, applications: &empty };
                let arguments = arguments
                    .iter()
                    .map(|a| a.evaluate(&only_symbols))
                    .collect::<Result<Vec<_>, _>>();
                match arguments {
                    Ok(arguments) => {
                        interpretation
                            .entry((*symbol, arguments))
                            .or_insert_with(|| domain[*digit].clone());
                    }
                    Err(EvalError::DivisionByZero) => {}
                    Err(e) => return Err(ProverError::Unsupported(e.to_string())),
                }
            }

            let assignment = Assignment { symbols: &symbols, applications: &interpretation };
            match vc.formula.evaluate(&assignment) {
                Ok(Value::Bool(true)) => {}
                Ok(Value::Bool(false)) => {
                    let model: Model = symbols.into_iter().collect();
                    debug!(query = name, "found a counterexample");
                    handler.on_model(&model.failing_blocks(vc), &model);
                    return Ok(Outcome::Errors);
                }
                Ok(Value::Int(_)) => {
                    return Err(ProverError::Unsupported(format!("`{name}` is not a formula")));
                }
                Err(EvalError::DivisionByZero) => inconclusive = true,
                Err(e) => return Err(ProverError::Unsupported(e.to_string())),
            }
            advance(&mut digits, &domains);
        }
        Ok(if inconclusive { Outcome::Inconclusive } else { Outcome::Correct })
    }
}

/// Step a mixed-radix counter.
fn advance(digits: &mut [usize], domains: &[Vec<Value>]) {
    for (digit, domain) in digits.iter_mut().zip(domains) {
        *digit += 1;
        if *digit < domain.len() {
            return;
        }
        *digit = 0;
    }
}

impl ProverOracle for BoundedProver {
    fn begin_check(&mut self, name: &str, vc: &VerificationCondition) -> Result<(), ProverError> {
        if let Some((pending, _)) = &self.pending {
            return Err(ProverError::QueryInFlight(pending.clone()));
        }
        self.pending = Some((name.to_string(), vc.clone()));
        Ok(())
    }

    fn check_outcome(&mut self, handler: &mut dyn ErrorHandler) -> Result<Outcome, ProverError> {
        let (name, vc) = self.pending.take().ok_or(ProverError::NoPendingQuery)?;
        let outcome = self.check(&name, &vc, handler)?;
        debug!(query = %name, %outcome, "bounded search finished");
        Ok(outcome)
    }
}
