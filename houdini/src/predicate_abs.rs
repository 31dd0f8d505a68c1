// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Predicate abstraction over user-supplied templates.
//!
//! The predicates come from procedures marked `template`: ensures marked
//! `pre` are pre-predicates, all other ensures are post-predicates. A summary
//! holds one clause per post-predicate `q`:
//!
//! ```text
//!     (c_1 || .. || c_n) ==> q
//! ```
//!
//! where each `c_j` is a conjunction of at most `C` signed pre-predicates. A
//! clause whose disjunction is `true` states `q` outright and one whose
//! disjunction is empty is vacuous.

use crate::domain::{evaluate_bool, instantiate, RenderContext, State, SummaryDomain};
use crate::{InferenceError, InferenceOptions, Result};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vc_ast::{Condition, Expr, Implementation, Program};

/// Attribute of procedures whose ensures are predicate templates.
pub const TEMPLATE_ATTRIBUTE: &str = "template";
/// Attribute of template ensures that are pre-predicates.
pub const PRE_ATTRIBUTE: &str = "pre";

/// A conjunction of pre-predicate literals: `(index, positive)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Conjunct(BTreeSet<(usize, bool)>);

impl Conjunct {
    fn literal(index: usize, positive: bool) -> Self {
        Conjunct(BTreeSet::from([(index, positive)]))
    }

    /// `self && other`, or `None` when that is unsatisfiable or too long.
    fn and(&self, other: &Conjunct, bound: usize) -> Option<Conjunct> {
        let literals: BTreeSet<_> = self.0.union(&other.0).copied().collect();
        let contradicts = literals.iter().any(|(i, p)| literals.contains(&(*i, !*p)));
        (!contradicts && literals.len() <= bound).then_some(Conjunct(literals))
    }

    fn implies(&self, other: &Conjunct) -> bool {
        self.0.is_superset(&other.0)
    }
}

/// The antecedent of one clause.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Disjunct {
    True,
    /// Empty means `false`.
    Any(Vec<Conjunct>),
}

impl Disjunct {
    fn is_false(&self) -> bool {
        matches!(self, Disjunct::Any(c) if c.is_empty())
    }

    /// Literals that each contradict the pre-predicate values `pre`.
    fn excluding(pre: &[bool], bound: usize) -> Self {
        let literals = pre.iter().enumerate().filter(|(_, v)| !**v).map(|(i, _)| (i, true));
        let literals = literals.chain(pre.iter().enumerate().filter(|(_, v)| **v).map(|(i, _)| (i, false)));
        let conjuncts = literals
            .map(|(i, positive)| Conjunct::literal(i, positive))
            .filter(|c| c.0.len() <= bound)
            .collect();
        Disjunct::Any(conjuncts)
    }

    /// Distribute `self && other` into a disjunction, dropping conjuncts that
    /// imply another one.
    fn and(&self, other: &Disjunct, bound: usize) -> Disjunct {
        let (left, right) = match (self, other) {
            (Disjunct::True, d) | (d, Disjunct::True) => return d.clone(),
            (Disjunct::Any(left), Disjunct::Any(right)) => (left, right),
        };
        let mut result: Vec<Conjunct> = Vec::new();
        for c1 in left {
            for c2 in right {
                let Some(c) = c1.and(c2, bound) else { continue };
                if result.iter().any(|kept| c.implies(kept)) {
                    continue;
                }
                result.retain(|kept| !kept.implies(&c));
                result.push(c);
            }
        }
        Disjunct::Any(result)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PredicateSummary {
    /// `None` until the first end-state is observed.
    clauses: Option<Vec<Disjunct>>,
    pre: Arc<Vec<Expr>>,
    post: Arc<Vec<Expr>>,
}

impl PredicateSummary {
    pub fn is_bottom(&self) -> bool {
        self.clauses.is_none()
    }

    fn conjunct_string(&self, conjunct: &Conjunct) -> String {
        let positive = conjunct.0.iter().filter(|(_, p)| *p).map(|(i, _)| self.pre[*i].to_string());
        let negative = conjunct.0.iter().filter(|(_, p)| !*p).map(|(i, _)| format!("!{}", self.pre[*i]));
        positive.chain(negative).join(" && ")
    }
}

impl fmt::Display for PredicateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(clauses) = &self.clauses else { return write!(f, "false") };
        let mut first = true;
        for (clause, post) in clauses.iter().zip(self.post.iter()) {
            if clause.is_false() {
                continue;
            }
            if !first {
                write!(f, " && ")?;
            }
            first = false;
            match clause {
                Disjunct::True => write!(f, "{post}")?,
                Disjunct::Any(conjuncts) => {
                    let disjuncts = conjuncts.iter().map(|c| self.conjunct_string(c)).join(" || ");
                    write!(f, "({disjuncts} ==> {post})")?;
                }
            }
        }
        if first {
            write!(f, "true")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PredicateAbstraction {
    pre: Arc<Vec<Expr>>,
    post: Arc<Vec<Expr>>,
    conjunct_bound: usize,
}

impl PredicateAbstraction {
    pub fn new(pre: Vec<Expr>, post: Vec<Expr>, conjunct_bound: usize) -> Self {
        PredicateAbstraction { pre: Arc::new(pre), post: Arc::new(post), conjunct_bound }
    }

    /// Collect the predicates declared by the template procedures of `program`.
    /// Conjunctions are limited to `options.conjunct_bound` literals.
    pub fn from_templates(program: &Program, options: &InferenceOptions) -> Result<Self> {
        let mut pre = Vec::new();
        let mut post = Vec::new();
        for procedure in program.procedures.iter().filter(|p| p.has_attribute(TEMPLATE_ATTRIBUTE)) {
            for ensures in &procedure.ensures {
                let Condition::Expr(predicate) = &ensures.condition else {
                    return Err(InferenceError::Internal(format!(
                        "template `{}` has a non-expression ensures",
                        procedure.name
                    )));
                };
                if ensures.has_attribute(PRE_ATTRIBUTE) {
                    pre.push(predicate.clone());
                } else {
                    post.push(predicate.clone());
                }
            }
        }
        debug!(pre = pre.len(), post = post.len(), "collected template predicates");
        Ok(PredicateAbstraction::new(pre, post, options.conjunct_bound))
    }

    fn pre_terms(
        &self,
        clauses: &[Disjunct],
        context: &RenderContext,
    ) -> Result<Vec<Option<Expr>>> {
        let mut used = BTreeSet::new();
        for clause in clauses {
            if let Disjunct::Any(conjuncts) = clause {
                used.extend(conjuncts.iter().flat_map(|c| c.0.iter().map(|(i, _)| *i)));
            }
        }
        (0..self.pre.len())
            .map(|i| used.contains(&i).then(|| instantiate(&self.pre[i], context)).transpose())
            .collect()
    }
}

impl SummaryDomain for PredicateAbstraction {
    type Summary = PredicateSummary;

    fn bottom(&self, _: &Program, _: &Implementation) -> Result<PredicateSummary> {
        Ok(PredicateSummary { clauses: None, pre: self.pre.clone(), post: self.post.clone() })
    }

    fn join(&self, summary: &PredicateSummary, state: &State) -> Result<PredicateSummary> {
        let pre = self.pre.iter().map(|p| evaluate_bool(p, state)).collect::<Result<Vec<_>>>()?;
        let post = self.post.iter().map(|p| evaluate_bool(p, state)).collect::<Result<Vec<_>>>()?;
        let mut clauses = summary.clauses.clone().unwrap_or_else(|| vec![Disjunct::True; post.len()]);
        for (clause, holds) in clauses.iter_mut().zip(post) {
            if clause.is_false() {
                continue;
            }
            let observed =
                if holds { Disjunct::True } else { Disjunct::excluding(&pre, self.conjunct_bound) };
            *clause = clause.and(&observed, self.conjunct_bound);
        }
        Ok(PredicateSummary { clauses: Some(clauses), ..summary.clone() })
    }

    fn render(&self, summary: &PredicateSummary, context: &RenderContext) -> Result<Expr> {
        let Some(clauses) = &summary.clauses else { return Ok(Expr::bool_false()) };
        let pre = self.pre_terms(clauses, context)?;
        let literal = |i: usize, positive: bool| -> Result<Expr> {
            let term = pre[i].clone().ok_or_else(|| {
                InferenceError::Internal(format!("pre-predicate {i} was not instantiated"))
            })?;
            Ok(if positive { term } else { !term })
        };
        let mut rendered = Vec::with_capacity(clauses.len());
        for (clause, post) in clauses.iter().zip(self.post.iter()) {
            let antecedent = match clause {
                Disjunct::True => Expr::bool_true(),
                Disjunct::Any(conjuncts) if conjuncts.is_empty() => continue,
                Disjunct::Any(conjuncts) => {
                    let mut disjuncts = Vec::with_capacity(conjuncts.len());
                    for conjunct in conjuncts {
                        let literals =
                            conjunct.0.iter().map(|(i, p)| literal(*i, *p)).collect::<Result<Vec<_>>>()?;
                        disjuncts.push(Expr::and_all(literals));
                    }
                    Expr::or_any(disjuncts)
                }
            };
            rendered.push(antecedent.implies_simp(instantiate(post, context)?));
        }
        Ok(Expr::and_all(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StateValuation;
    use proptest::prelude::*;
    use vc_ast::{Ensures, InternedString, Procedure, Value};

    /// pre: `x > 0`, `g > 0`; post: `r > 0`, `g == old(g)`
    fn domain(bound: usize) -> PredicateAbstraction {
        let x = || Expr::symbol("x");
        let g = || Expr::symbol("g");
        PredicateAbstraction::new(
            vec![x().gt(Expr::int_constant(0)), g().gt(Expr::int_constant(0))],
            vec![Expr::symbol("r").gt(Expr::int_constant(0)), g().eq(g().old())],
            bound,
        )
    }

    fn state(x: i64, old_g: i64, g: i64, r: i64) -> State {
        [
            (InternedString::from("g").old_name(), Value::Int(old_g.into())),
            ("x".into(), Value::Int(x.into())),
            ("g".into(), Value::Int(g.into())),
            ("r".into(), Value::Int(r.into())),
        ]
        .into()
    }

    fn context() -> RenderContext {
        ["x", "g", "r"].iter().map(|n| ((*n).into(), Expr::symbol(*n))).chain([(
            InternedString::from("g").old_name(),
            Expr::symbol("g").old(),
        )])
        .collect()
    }

    fn join_all(domain: &PredicateAbstraction, states: &[State]) -> PredicateSummary {
        let bottom = domain.bottom(&Program::new(), &Implementation::new("P".into(), vec![], vec![]));
        states.iter().fold(bottom.unwrap(), |s, state| domain.join(&s, state).unwrap())
    }

    #[test]
    fn templates_are_split_by_attribute() {
        let mut program = Program::new();
        let mut t = Procedure::new("T".into(), vec![], vec![]);
        t.attributes.push(TEMPLATE_ATTRIBUTE.into());
        t.ensures.push(Ensures::new(Expr::symbol("a")).with_attribute(PRE_ATTRIBUTE));
        t.ensures.push(Ensures::new(Expr::symbol("b")));
        program.add_procedure(t);
        let mut other = Procedure::new("Q".into(), vec![], vec![]);
        other.ensures.push(Ensures::new(Expr::symbol("c")));
        program.add_procedure(other);

        let domain = PredicateAbstraction::from_templates(&program, &InferenceOptions::default()).unwrap();
        assert_eq!(*domain.pre, vec![Expr::symbol("a")]);
        assert_eq!(*domain.post, vec![Expr::symbol("b")]);
    }

    #[test]
    fn bottom_renders_false() {
        let d = domain(3);
        let s = join_all(&d, &[]);
        assert_eq!(s.to_string(), "false");
        assert_eq!(d.render(&s, &context()).unwrap(), Expr::bool_false());
    }

    #[test]
    fn holding_post_predicates_are_stated_outright() {
        let d = domain(3);
        let s = join_all(&d, &[state(1, 1, 1, 5)]);
        assert_eq!(s.to_string(), "(r > 0) && (g == old(g))");
        let g = Expr::symbol("g");
        let expected = Expr::symbol("r").gt(Expr::int_constant(0)).and(g.clone().eq(g.old()));
        assert_eq!(d.render(&s, &context()).unwrap(), expected);
    }

    #[test]
    fn failing_post_predicate_is_guarded_by_excluded_pre_state() {
        let d = domain(3);
        // x <= 0 and g > 0 when r > 0 fails
        let s = join_all(&d, &[state(0, 1, 1, 0)]);
        let x_pos = Expr::symbol("x").gt(Expr::int_constant(0));
        let g_pos = Expr::symbol("g").gt(Expr::int_constant(0));
        let r_pos = Expr::symbol("r").gt(Expr::int_constant(0));
        let g = Expr::symbol("g");
        let expected = x_pos.clone().or(!g_pos.clone()).implies(r_pos).and(g.clone().eq(g.old()));
        assert_eq!(d.render(&s, &context()).unwrap(), expected);

        // a second failure with x > 0 and g <= 0 takes two literals to exclude
        let s = d.join(&s, &state(1, 0, 0, 0)).unwrap();
        let expected = Disjunct::Any(vec![
            Conjunct(BTreeSet::from([(0, true), (1, true)])),
            Conjunct(BTreeSet::from([(0, false), (1, false)])),
        ]);
        assert_eq!(s.clauses.as_ref().unwrap()[0], expected);
    }

    #[test]
    fn contradicted_clause_never_recovers() {
        let d = domain(3);
        // r > 0 fails under every valuation of the pre-predicates
        let failures = [state(0, 0, 0, 0), state(1, 1, 1, 0), state(0, 1, 1, 0), state(1, 0, 0, 0)];
        let s = join_all(&d, &failures);
        assert!(s.clauses.as_ref().unwrap()[0].is_false());
        let s = d.join(&s, &state(1, 1, 1, 1)).unwrap();
        assert!(s.clauses.as_ref().unwrap()[0].is_false());
        assert_eq!(s.to_string(), "(g == old(g))");
    }

    #[test]
    fn conjunct_bound_limits_literals() {
        let d = domain(1);
        let s = join_all(&d, &[state(0, 1, 1, 0), state(1, 0, 0, 0)]);
        assert!(s.clauses.as_ref().unwrap()[0].is_false());
    }

    #[test]
    fn conjunct_bound_comes_from_options() {
        let mut program = Program::new();
        let mut t = Procedure::new("T".into(), vec![], vec![]);
        t.attributes.push(TEMPLATE_ATTRIBUTE.into());
        let pre = |e: Expr| Ensures::new(e).with_attribute(PRE_ATTRIBUTE);
        t.ensures.push(pre(Expr::symbol("x").gt(Expr::int_constant(0))));
        t.ensures.push(pre(Expr::symbol("g").gt(Expr::int_constant(0))));
        t.ensures.push(Ensures::new(Expr::symbol("r").gt(Expr::int_constant(0))));
        program.add_procedure(t);
        // excluding both failures needs two literals per conjunct
        let failures = [state(0, 1, 1, 0), state(1, 0, 0, 0)];

        let wide = PredicateAbstraction::from_templates(&program, &InferenceOptions::default()).unwrap();
        assert!(!join_all(&wide, &failures).clauses.as_ref().unwrap()[0].is_false());

        let options = InferenceOptions::from_toml_str("conjunct-bound = 1").unwrap();
        let narrow = PredicateAbstraction::from_templates(&program, &options).unwrap();
        let s = join_all(&narrow, &failures);
        assert!(s.clauses.as_ref().unwrap()[0].is_false());
        assert_eq!(s.to_string(), "true");
    }

    #[test]
    fn unmapped_predicate_variable_is_internal() {
        let d = domain(3);
        let partial: State = [("x".into(), Value::Int(0.into()))].into();
        let s = join_all(&d, &[]);
        assert!(matches!(d.join(&s, &partial), Err(InferenceError::Internal(_))));
    }

    fn arb_state() -> impl Strategy<Value = State> {
        (-2i64..=2, -2i64..=2, -2i64..=2, -2i64..=2).prop_map(|(x, o, g, r)| state(x, o, g, r))
    }

    fn admits(d: &PredicateAbstraction, s: &PredicateSummary, state: &State) -> bool {
        // a summary rendered over the state's own names, evaluated in the state
        let formula = d.render(s, &context()).unwrap();
        formula.evaluate(&StateValuation(state)) == Ok(Value::Bool(true))
    }

    proptest! {
        #[test]
        fn join_only_weakens(states in prop::collection::vec(arb_state(), 1..6), other in arb_state()) {
            let d = domain(2);
            let mut summary = join_all(&d, &[]);
            for state in &states {
                let next = d.join(&summary, state).unwrap();
                prop_assert!(admits(&d, &next, state));
                if admits(&d, &summary, &other) {
                    prop_assert!(admits(&d, &next, &other));
                }
                summary = next;
            }
        }
    }
}
