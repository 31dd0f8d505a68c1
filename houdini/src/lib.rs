// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interprocedural contract inference in the style of Abstract Houdini.
//!
//! Every implementation gets an uninterpreted summary predicate that is
//! assumed at its call sites and asserted at its exit. The engine then
//! searches for the strongest summaries, drawn from a [SummaryDomain], that
//! make all verification conditions valid: each counterexample found by the
//! prover oracle is an end-state the summary must admit, so it is joined into
//! the summary and the check repeats. Changed summaries re-enqueue callers
//! until a fixpoint is reached.

mod call_graph;
mod constant_set;
mod domain;
mod engine;
mod options;
mod predicate_abs;
pub mod session;

pub use constant_set::{ConstantSet, ConstantSummary, Observed};
pub use domain::{RenderContext, State, SummaryDomain};
pub use engine::{
    summary_predicate, Diagnostic, ImplementationSummary, InferenceEngine, InferenceReport,
    NodeState,
};
pub use options::InferenceOptions;
pub use predicate_abs::{
    PredicateAbstraction, PredicateSummary, PRE_ATTRIBUTE, TEMPLATE_ATTRIBUTE,
};

use prover_oracle::ProverError;
use thiserror::Error;
use vcgen::VcGenError;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    VcGen(#[from] VcGenError),
    #[error(transparent)]
    Prover(#[from] ProverError),
    #[error("invalid inference options: {0}")]
    Options(#[from] toml::de::Error),
    /// A placeholder, model or predicate that does not fit the program, e.g.
    /// a state missing a variable that a predicate reads.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;
