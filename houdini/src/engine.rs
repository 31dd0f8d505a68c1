// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interprocedural worklist.
//!
//! Implementations are visited callees first. Visiting `P` checks
//!
//! ```text
//!     env && self ==> vc(P)
//! ```
//!
//! where `env` defines every callee placeholder in `vc(P)` by the callee's
//! current summary and `self` does the same for `P`'s own placeholders,
//! including the one asserted at `P`'s exit. Each counterexample is an
//! end-state of `P` that the summary must admit, so it is joined in and the
//! check repeats until it passes. A changed summary re-enqueues the callers.

use crate::call_graph::CallGraph;
use crate::domain::{RenderContext, State, SummaryDomain};
use crate::{InferenceError, InferenceOptions, Result};
use prover_oracle::{ErrorHandler, Model, Outcome, ProverOracle};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};
use vc_ast::{
    Cmd, Ensures, Expr, Function, InternedString, Literal, Parameter, Program, Type, Value,
    VerificationCondition,
};
use vcgen::{PassiveImplementation, VcGenerator};

/// Name of the uninterpreted predicate standing for the summary of
/// `implementation`.
pub fn summary_predicate(implementation: InternedString) -> InternedString {
    format!("{implementation}SummaryPred").into()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum NodeState {
    Unprocessed,
    Stable,
}

/// Why a summary may not be the one the verification conditions call for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// The oracle gave no verdict; the summary was left as it was.
    OracleFailure { implementation: InternedString, outcome: Outcome },
    /// A counterexample the summary already admits, e.g. a failing assertion
    /// in the body that no summary can rule out.
    NoProgress { implementation: InternedString },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::OracleFailure { implementation, outcome } => {
                write!(f, "`{implementation}`: oracle answered {outcome}")
            }
            Diagnostic::NoProgress { implementation } => {
                write!(f, "`{implementation}`: counterexample is not excluded by its summary")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImplementationSummary<S> {
    pub implementation: InternedString,
    pub summary: S,
    /// The summary over the implementation's own names, with `old(g)` for
    /// entry values.
    pub formula: Expr,
    pub state: NodeState,
}

#[derive(Clone, Debug)]
pub struct InferenceReport<S> {
    /// In declaration order.
    pub summaries: Vec<ImplementationSummary<S>>,
    pub queries: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl<S> InferenceReport<S> {
    pub fn summary(&self, implementation: &str) -> Option<&ImplementationSummary<S>> {
        self.summaries.iter().find(|s| s.implementation == implementation)
    }
}

/// Placeholder layout of one implementation.
struct Signature {
    /// Names of the placeholder arguments: `old(g)` for every global, then
    /// in-parameters, out-parameters and modified globals.
    keys: Vec<InternedString>,
    /// What `keys` denote inside the implementation itself.
    own_terms: Vec<Expr>,
}

struct Node {
    name: InternedString,
    signature: Signature,
    vc: VerificationCondition,
    /// Arguments of the placeholder asserted at the exit.
    end_state: Vec<Expr>,
    /// Placeholder applications in `vc`, by the index of the node they stand for.
    sites: Vec<(usize, Vec<Expr>)>,
}

/// Keeps the first counterexample.
#[derive(Default)]
struct FirstModel(Option<Model>);

impl ErrorHandler for FirstModel {
    fn on_model(&mut self, _labels: &[String], model: &Model) {
        if self.0.is_none() {
            self.0 = Some(model.clone());
        }
    }
}

/// Declare a summary predicate for every implementation and add it to the
/// ensures of its procedure.
fn attach_summary_predicates(program: &mut Program) -> Result<Vec<Signature>> {
    let mut seen = BTreeSet::new();
    let mut attached = Vec::with_capacity(program.implementations.len());
    for implementation in &program.implementations {
        let name = implementation.name;
        if !seen.insert(name) {
            return Err(InferenceError::Internal(format!("`{name}` has several implementations")));
        }
        let procedure = program
            .procedure(name)
            .ok_or_else(|| InferenceError::Internal(format!("no procedure for `{name}`")))?;
        if procedure.in_params.len() != implementation.in_params.len()
            || procedure.out_params.len() != implementation.out_params.len()
        {
            return Err(InferenceError::Internal(format!(
                "`{name}` does not match the signature of its procedure"
            )));
        }

        let mut parameters = Vec::new();
        let mut arguments = Vec::new();
        let mut signature = Signature { keys: Vec::new(), own_terms: Vec::new() };
        for global in &program.globals {
            parameters.push(Parameter::new(global.name.old_name(), global.typ.clone()));
            arguments.push(Expr::symbol(global.name).old());
            signature.keys.push(global.name.old_name());
            signature.own_terms.push(Expr::symbol(global.name).old());
        }
        let formals = procedure.in_params.iter().chain(&procedure.out_params);
        let actuals = implementation.in_params.iter().chain(&implementation.out_params);
        for (formal, actual) in formals.zip(actuals) {
            parameters.push(Parameter::new(actual.name, formal.typ.clone()));
            arguments.push(Expr::symbol(formal.name));
            signature.keys.push(actual.name);
            signature.own_terms.push(Expr::symbol(actual.name));
        }
        for global in &procedure.modifies {
            let declaration = program.global(*global).ok_or_else(|| {
                InferenceError::Internal(format!("`{name}` modifies undeclared global `{global}`"))
            })?;
            parameters.push(Parameter::new(*global, declaration.typ.clone()));
            arguments.push(Expr::symbol(*global));
            signature.keys.push(*global);
            signature.own_terms.push(Expr::symbol(*global));
        }
        let predicate = Function::new(summary_predicate(name), parameters, Type::Bool);
        attached.push((name, predicate, arguments, signature));
    }

    let mut signatures = Vec::with_capacity(attached.len());
    for (name, predicate, arguments, signature) in attached {
        let ensures = Ensures::new(Expr::function_call(predicate.name, arguments));
        program.add_function(predicate);
        if let Some(procedure) = program.procedure_mut(name) {
            procedure.ensures.push(ensures);
        }
        signatures.push(signature);
    }
    Ok(signatures)
}

/// Arguments of the summary placeholder `predicate` asserted in `passive`.
fn end_state(passive: &PassiveImplementation, predicate: InternedString) -> Result<Vec<Expr>> {
    let implementation = &passive.implementation;
    implementation
        .blocks()
        .iter()
        .flat_map(|b| &b.cmds)
        .find_map(|cmd| match cmd {
            Cmd::Assert(assert) => match &assert.condition {
                Expr::FunctionCall { symbol, arguments } if *symbol == predicate => {
                    Some(arguments.clone())
                }
                _ => None,
            },
            _ => None,
        })
        .ok_or_else(|| {
            InferenceError::Internal(format!(
                "`{}` does not assert its summary at the exit",
                implementation.name
            ))
        })
}

pub struct InferenceEngine<D: SummaryDomain> {
    program: Program,
    domain: D,
    call_graph: CallGraph,
    nodes: Vec<Node>,
    summaries: Vec<D::Summary>,
    states: Vec<NodeState>,
    queries: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<D: SummaryDomain> InferenceEngine<D> {
    /// Instrument a copy of `program` with summary placeholders and generate
    /// the verification condition of every implementation.
    pub fn new(program: &Program, domain: D, options: &InferenceOptions) -> Result<Self> {
        let mut program = program.clone();
        let signatures = attach_summary_predicates(&mut program)?;
        let call_graph = CallGraph::new(&program);

        let generator = VcGenerator::new(&program, options.vcgen.clone());
        let mut nodes = Vec::with_capacity(signatures.len());
        for (implementation, signature) in program.implementations.iter().zip(signatures) {
            let (passive, vc) = generator.verification_condition(implementation)?;
            let end_state = end_state(&passive, summary_predicate(implementation.name))?;
            if end_state.len() != signature.keys.len() {
                return Err(InferenceError::Internal(format!(
                    "summary of `{}` has {} arguments, expected {}",
                    implementation.name,
                    end_state.len(),
                    signature.keys.len()
                )));
            }
            nodes.push(Node { name: implementation.name, signature, vc, end_state, sites: Vec::new() });
        }

        let predicates: Vec<InternedString> = nodes.iter().map(|n| summary_predicate(n.name)).collect();
        for node in &mut nodes {
            for (callee, predicate) in predicates.iter().enumerate() {
                for application in node.vc.formula.applications_of(*predicate) {
                    if let Expr::FunctionCall { arguments, .. } = application {
                        node.sites.push((callee, arguments));
                    }
                }
            }
            debug!(implementation = %node.name, sites = node.sites.len(), "found summary placeholders");
        }

        let summaries = program
            .implementations
            .iter()
            .map(|implementation| domain.bottom(&program, implementation))
            .collect::<Result<Vec<_>>>()?;
        let states = vec![NodeState::Unprocessed; nodes.len()];
        Ok(InferenceEngine {
            program,
            domain,
            call_graph,
            nodes,
            summaries,
            states,
            queries: 0,
            diagnostics: Vec::new(),
        })
    }

    /// The instrumented program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Run the worklist to a fixpoint.
    pub fn compute_summaries(
        &mut self,
        oracle: &mut dyn ProverOracle,
    ) -> Result<InferenceReport<D::Summary>> {
        let mut worklist: BTreeSet<(usize, usize)> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (self.call_graph.priority(node.name), index))
            .collect();
        while let Some((_, index)) = worklist.pop_first() {
            let changed = self.process(index, oracle)?;
            self.states[index] = NodeState::Stable;
            if changed {
                let name = self.nodes[index].name;
                for caller in self.call_graph.callers(name) {
                    if let Some(i) = self.nodes.iter().position(|n| n.name == caller && caller != name) {
                        worklist.insert((self.call_graph.priority(caller), i));
                    }
                }
            }
        }
        self.report()
    }

    /// `placeholder(arguments) <==> summary`, for a placeholder of `target`.
    fn define(&self, target: usize, arguments: &[Expr]) -> Result<Expr> {
        let node = &self.nodes[target];
        if arguments.len() != node.signature.keys.len() {
            return Err(InferenceError::Internal(format!(
                "placeholder for `{}` has {} arguments, expected {}",
                node.name,
                arguments.len(),
                node.signature.keys.len()
            )));
        }
        let context: RenderContext =
            node.signature.keys.iter().copied().zip(arguments.iter().cloned()).collect();
        let summary = self.domain.render(&self.summaries[target], &context)?;
        let placeholder = Expr::function_call(summary_predicate(node.name), arguments.to_vec());
        Ok(placeholder.iff(summary))
    }

    /// The end-state of `node` in `model`.
    fn project(&self, node: &Node, model: &Model) -> Result<State> {
        let mut state = State::new();
        for (key, term) in node.signature.keys.iter().zip(&node.end_state) {
            let value = match term {
                Expr::Literal(Literal::Int(i)) => Value::Int(i.clone()),
                Expr::Literal(Literal::Bool(b)) => Value::Bool(*b),
                Expr::Symbol { name } => model.element(*name).cloned().ok_or_else(|| {
                    InferenceError::Internal(format!("model of `{}` has no value for `{name}`", node.name))
                })?,
                other => {
                    return Err(InferenceError::Internal(format!(
                        "cannot read the value of `{other}` from a model"
                    )));
                }
            };
            state.insert(*key, value);
        }
        Ok(state)
    }

    /// Weaken the summary of `index` until its verification condition holds.
    /// Returns whether the summary changed.
    fn process(&mut self, index: usize, oracle: &mut dyn ProverOracle) -> Result<bool> {
        let node = &self.nodes[index];
        let env = node
            .sites
            .iter()
            .filter(|(target, _)| *target != index)
            .map(|(target, arguments)| self.define(*target, arguments))
            .collect::<Result<Vec<_>>>()?;
        let env = Expr::and_all(env);

        let mut changed = false;
        loop {
            let own = node
                .sites
                .iter()
                .filter(|(target, _)| *target == index)
                .map(|(_, arguments)| self.define(index, arguments))
                .collect::<Result<Vec<_>>>()?;
            let assumptions = env.clone().and_simp(Expr::and_all(own));
            let query = node.vc.with_formula(assumptions.implies_simp(node.vc.formula.clone()));

            self.queries += 1;
            oracle.begin_check(&node.name.to_string(), &query)?;
            let mut handler = FirstModel::default();
            let outcome = oracle.check_outcome(&mut handler)?;
            debug!(implementation = %node.name, %outcome, "checked summary");
            match (outcome, handler.0) {
                (Outcome::Correct, _) => break,
                (Outcome::Errors, Some(model)) => {
                    let state = self.project(node, &model)?;
                    let joined = self.domain.join(&self.summaries[index], &state)?;
                    if joined == self.summaries[index] {
                        warn!(implementation = %node.name, "counterexample is already admitted");
                        self.diagnostics.push(Diagnostic::NoProgress { implementation: node.name });
                        break;
                    }
                    debug!(implementation = %node.name, summary = %joined, "weakened summary");
                    self.summaries[index] = joined;
                    changed = true;
                }
                (Outcome::Errors, None) => {
                    return Err(InferenceError::Internal(format!(
                        "oracle reported errors for `{}` without a model",
                        node.name
                    )));
                }
                (outcome, _) => {
                    warn!(implementation = %node.name, %outcome, "oracle gave no verdict");
                    self.diagnostics
                        .push(Diagnostic::OracleFailure { implementation: node.name, outcome });
                    break;
                }
            }
        }
        Ok(changed)
    }

    fn report(&self) -> Result<InferenceReport<D::Summary>> {
        let mut summaries = Vec::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            let context: RenderContext = node
                .signature
                .keys
                .iter()
                .copied()
                .zip(node.signature.own_terms.iter().cloned())
                .collect();
            let summary = self.summaries[index].clone();
            let formula = self.domain.render(&summary, &context)?;
            info!(implementation = %node.name, %summary, "inferred summary");
            summaries.push(ImplementationSummary {
                implementation: node.name,
                summary,
                formula,
                state: self.states[index],
            });
        }
        for diagnostic in &self.diagnostics {
            info!(%diagnostic, "inference diagnostic");
        }
        Ok(InferenceReport {
            summaries,
            queries: self.queries,
            diagnostics: self.diagnostics.clone(),
        })
    }
}
