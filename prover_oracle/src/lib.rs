// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decision procedures for verification conditions.
//!
//! A [ProverOracle] is handed one closed formula at a time. It answers
//! whether the formula is valid, and when it is not, passes a counterexample
//! model to an [ErrorHandler] before reporting [Outcome::Errors].
//!
//! Two oracles are provided:
//!  - [SmtLibProver] writes the condition as an SMT-LIB script and runs an
//!    external solver (`z3` by default).
//!  - [BoundedProver] enumerates small integer and boolean assignments. It is
//!    complete only within its bounds and is meant for tests and tiny inputs.

mod bounded;
mod sexp;
mod smtlib;

pub use bounded::{BoundedOptions, BoundedProver};
pub use smtlib::{SmtLibOptions, SmtLibProver};

use std::collections::BTreeMap;
use thiserror::Error;
use vc_ast::{InternedString, Valuation, Value, VerificationCondition};

/// Result of one query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Outcome {
    /// The condition is valid
    Correct,
    /// The condition is invalid; the handler has seen a counterexample
    Errors,
    TimedOut,
    OutOfMemory,
    /// The oracle gave up for any other reason
    Inconclusive,
}

/// Values of the symbols of a verification condition in a counterexample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<InternedString, Value>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn insert(&mut self, name: InternedString, value: Value) {
        self.values.insert(name, value);
    }

    pub fn element(&self, name: InternedString) -> Option<&Value> {
        self.values.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InternedString, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The block variables of `vc` that are false in this model: the blocks
    /// from which some assertion can fail.
    pub fn failing_blocks(&self, vc: &VerificationCondition) -> Vec<String> {
        vc.block_variables
            .iter()
            .filter(|name| self.element(**name).and_then(Value::as_bool) == Some(false))
            .map(|name| name.to_string())
            .collect()
    }
}

impl FromIterator<(InternedString, Value)> for Model {
    fn from_iter<T: IntoIterator<Item = (InternedString, Value)>>(iter: T) -> Self {
        Model { values: iter.into_iter().collect() }
    }
}

impl Valuation for Model {
    fn symbol(&self, name: InternedString) -> Option<Value> {
        self.element(name).cloned()
    }
}

/// Receives counterexamples while an oracle answers a query.
pub trait ErrorHandler {
    /// `labels` names the failing blocks when the oracle can tell.
    fn on_model(&mut self, labels: &[String], model: &Model);
}

/// Keeps every model it is given.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    pub models: Vec<(Vec<String>, Model)>,
}

impl ErrorHandler for CollectingHandler {
    fn on_model(&mut self, labels: &[String], model: &Model) {
        self.models.push((labels.to_vec(), model.clone()));
    }
}

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("no query has been started")]
    NoPendingQuery,
    #[error("query `{0}` has not been answered yet")]
    QueryInFlight(String),
    #[error("cannot encode the condition: {0}")]
    Unsupported(String),
    #[error("unexpected prover response: {0}")]
    UnexpectedResponse(String),
    #[error(transparent)]
    Process(#[from] anyhow::Error),
}

/// A decision procedure answering one query at a time.
pub trait ProverOracle {
    /// Start checking the validity of `vc`.
    fn begin_check(&mut self, name: &str, vc: &VerificationCondition) -> Result<(), ProverError>;

    /// Wait for the answer to the pending query. Counterexamples are passed to
    /// `handler` before `Outcome::Errors` is returned.
    fn check_outcome(&mut self, handler: &mut dyn ErrorHandler) -> Result<Outcome, ProverError>;

    fn close(&mut self) -> Result<(), ProverError> {
        Ok(())
    }
}
