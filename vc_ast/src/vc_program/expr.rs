// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{BinaryOp, Expr, Literal, UnaryOp};
use crate::InternedString;
use num_bigint::BigInt;
use std::collections::BTreeSet;
use std::ops::Not;

/// A substitution for free symbols. `None` leaves the symbol unchanged.
pub type SymbolMap<'a> = &'a dyn Fn(InternedString) -> Option<Expr>;

///////////////////////////////////////////////////////////////////////////////////////////////
/// Constructors
///////////////////////////////////////////////////////////////////////////////////////////////
impl Expr {
    pub fn literal(l: Literal) -> Self {
        Expr::Literal(l)
    }

    pub fn bool_constant(value: bool) -> Self {
        Expr::Literal(Literal::Bool(value))
    }

    pub fn bool_true() -> Self {
        Expr::bool_constant(true)
    }

    pub fn bool_false() -> Self {
        Expr::bool_constant(false)
    }

    pub fn int_constant<T: Into<BigInt>>(value: T) -> Self {
        Expr::Literal(Literal::Int(value.into()))
    }

    pub fn symbol<T: Into<InternedString>>(name: T) -> Self {
        Expr::Symbol { name: name.into() }
    }

    pub fn old(self) -> Self {
        Expr::Old(Box::new(self))
    }

    pub fn function_call<T: Into<InternedString>>(symbol: T, arguments: Vec<Expr>) -> Self {
        Expr::FunctionCall { symbol: symbol.into(), arguments }
    }

    pub fn unop(op: UnaryOp, operand: Expr) -> Self {
        Expr::UnaryOp { op, operand: Box::new(operand) }
    }

    pub fn binop(self, op: BinaryOp, rhs: Expr) -> Self {
        Expr::BinaryOp { op, left: Box::new(self), right: Box::new(rhs) }
    }

    pub fn neg(self) -> Self {
        Expr::unop(UnaryOp::Neg, self)
    }

    pub fn and(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Or, rhs)
    }

    pub fn implies(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Implies, rhs)
    }

    pub fn iff(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Iff, rhs)
    }

    pub fn eq(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Eq, rhs)
    }

    pub fn neq(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Neq, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Lt, rhs)
    }

    pub fn le(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Lte, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Gt, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Gte, rhs)
    }

    pub fn plus(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Add, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Sub, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Mul, rhs)
    }

    pub fn div(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Div, rhs)
    }

    pub fn rem(self, rhs: Expr) -> Self {
        self.binop(BinaryOp::Mod, rhs)
    }
}

impl Not for Expr {
    type Output = Self;

    fn not(self) -> Self::Output {
        Expr::unop(UnaryOp::Not, self)
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////
/// Simplifying constructors
///////////////////////////////////////////////////////////////////////////////////////////////
/// These fold boolean constants away, nothing else. They keep the formulas
/// sent to a prover readable when most conjuncts are trivially `true`.
impl Expr {
    pub fn and_simp(self, rhs: Expr) -> Self {
        if self.is_true() || rhs.is_false() {
            rhs
        } else if rhs.is_true() || self.is_false() {
            self
        } else {
            self.and(rhs)
        }
    }

    pub fn or_simp(self, rhs: Expr) -> Self {
        if self.is_false() || rhs.is_true() {
            rhs
        } else if rhs.is_false() || self.is_true() {
            self
        } else {
            self.or(rhs)
        }
    }

    pub fn implies_simp(self, rhs: Expr) -> Self {
        if self.is_true() {
            rhs
        } else if self.is_false() || rhs.is_true() {
            Expr::bool_true()
        } else if rhs.is_false() {
            !self
        } else {
            self.implies(rhs)
        }
    }

    /// Conjunction of all `exprs`; `true` when empty.
    pub fn and_all<I: IntoIterator<Item = Expr>>(exprs: I) -> Self {
        exprs.into_iter().fold(Expr::bool_true(), Expr::and_simp)
    }

    /// Disjunction of all `exprs`; `false` when empty.
    pub fn or_any<I: IntoIterator<Item = Expr>>(exprs: I) -> Self {
        exprs.into_iter().fold(Expr::bool_false(), Expr::or_simp)
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////
/// Queries
///////////////////////////////////////////////////////////////////////////////////////////////
impl Expr {
    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Bool(true)))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Bool(false)))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    pub fn as_symbol(&self) -> Option<InternedString> {
        match self {
            Expr::Symbol { name } => Some(*name),
            _ => None,
        }
    }

    /// Pre-order traversal of every sub-expression, including `self`.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Symbol { .. } => {}
            Expr::Old(e) => e.visit(f),
            Expr::UnaryOp { operand, .. } => operand.visit(f),
            Expr::BinaryOp { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::FunctionCall { arguments, .. } => arguments.iter().for_each(|a| a.visit(f)),
        }
    }

    /// Symbols that occur outside of any `old(..)`.
    pub fn free_symbols(&self) -> BTreeSet<InternedString> {
        let mut current = BTreeSet::new();
        let mut old = BTreeSet::new();
        self.collect_symbols(&mut current, &mut old, false);
        current
    }

    /// Symbols that occur under an `old(..)`.
    pub fn old_symbols(&self) -> BTreeSet<InternedString> {
        let mut current = BTreeSet::new();
        let mut old = BTreeSet::new();
        self.collect_symbols(&mut current, &mut old, false);
        old
    }

    fn collect_symbols(
        &self,
        current: &mut BTreeSet<InternedString>,
        old: &mut BTreeSet<InternedString>,
        in_old: bool,
    ) {
        match self {
            Expr::Literal(_) => {}
            Expr::Symbol { name } => {
                if in_old {
                    old.insert(*name);
                } else {
                    current.insert(*name);
                }
            }
            Expr::Old(e) => e.collect_symbols(current, old, true),
            Expr::UnaryOp { operand, .. } => operand.collect_symbols(current, old, in_old),
            Expr::BinaryOp { left, right, .. } => {
                left.collect_symbols(current, old, in_old);
                right.collect_symbols(current, old, in_old);
            }
            Expr::FunctionCall { arguments, .. } => {
                arguments.iter().for_each(|a| a.collect_symbols(current, old, in_old))
            }
        }
    }

    /// Every application of a function named `symbol`, in pre-order, without
    /// duplicates.
    pub fn applications_of(&self, symbol: InternedString) -> Vec<Expr> {
        let mut found = Vec::new();
        self.visit(&mut |e| {
            if let Expr::FunctionCall { symbol: s, .. } = e {
                if *s == symbol && !found.contains(e) {
                    found.push(e.clone());
                }
            }
        });
        found
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////
/// Substitution
///////////////////////////////////////////////////////////////////////////////////////////////
impl Expr {
    /// Replace free symbols everywhere, `old(..)` sub-expressions included.
    /// `old` wrappers are kept.
    pub fn substitute(&self, map: SymbolMap) -> Expr {
        self.rewrite(&|name, _| map(name), false, true)
    }

    /// Replace free symbols and eliminate `old(..)`.
    ///
    /// Outside of `old(..)` the `always` map applies. Under `old(..)` the
    /// `for_old` map applies first and `always` covers the names it does not
    /// map. The `old` wrapper itself is dropped from the result.
    pub fn substitute_replacing_old(&self, always: SymbolMap, for_old: SymbolMap) -> Expr {
        let lookup = |name: InternedString, in_old: bool| {
            if in_old { for_old(name).or_else(|| always(name)) } else { always(name) }
        };
        self.rewrite(&lookup, false, false)
    }

    fn rewrite(
        &self,
        f: &dyn Fn(InternedString, bool) -> Option<Expr>,
        in_old: bool,
        keep_old: bool,
    ) -> Expr {
        match self {
            Expr::Literal(_) => self.clone(),
            Expr::Symbol { name } => f(*name, in_old).unwrap_or_else(|| self.clone()),
            Expr::Old(e) => {
                let inner = e.rewrite(f, true, keep_old);
                if keep_old { inner.old() } else { inner }
            }
            Expr::UnaryOp { op, operand } => Expr::unop(*op, operand.rewrite(f, in_old, keep_old)),
            Expr::BinaryOp { op, left, right } => {
                left.rewrite(f, in_old, keep_old).binop(*op, right.rewrite(f, in_old, keep_old))
            }
            Expr::FunctionCall { symbol, arguments } => Expr::FunctionCall {
                symbol: *symbol,
                arguments: arguments.iter().map(|a| a.rewrite(f, in_old, keep_old)).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map_of(pairs: &[(&str, Expr)]) -> BTreeMap<InternedString, Expr> {
        pairs.iter().map(|(n, e)| (InternedString::from(n), e.clone())).collect()
    }

    #[test]
    fn simplifying_constructors_fold_constants() {
        let x = Expr::symbol("x");
        assert_eq!(Expr::bool_true().and_simp(x.clone()), x);
        assert_eq!(x.clone().and_simp(Expr::bool_false()), Expr::bool_false());
        assert_eq!(Expr::bool_false().or_simp(x.clone()), x);
        assert_eq!(Expr::bool_false().implies_simp(x.clone()), Expr::bool_true());
        assert_eq!(x.clone().implies_simp(Expr::bool_false()), !x.clone());
        assert_eq!(Expr::and_all(vec![]), Expr::bool_true());
        assert_eq!(Expr::or_any(vec![]), Expr::bool_false());
    }

    #[test]
    fn old_symbols_are_reported_separately() {
        let e = Expr::symbol("x").plus(Expr::symbol("g").old()).eq(Expr::symbol("g"));
        let current: Vec<_> = e.free_symbols().into_iter().collect();
        let old: Vec<_> = e.old_symbols().into_iter().collect();
        assert_eq!(current.len(), 2);
        assert!(current.contains(&"x".into()) && current.contains(&"g".into()));
        assert_eq!(old, vec![InternedString::from("g")]);
    }

    #[test]
    fn substitute_keeps_old() {
        let map = map_of(&[("x", Expr::symbol("y"))]);
        let e = Expr::symbol("x").old().eq(Expr::symbol("x"));
        let result = e.substitute(&|n| map.get(&n).cloned());
        assert_eq!(result, Expr::symbol("y").old().eq(Expr::symbol("y")));
    }

    #[test]
    fn substitute_replacing_old_prefers_old_frame() {
        let always = map_of(&[("g", Expr::symbol("g@2")), ("x", Expr::symbol("x@0"))]);
        let for_old = map_of(&[("g", Expr::symbol("g"))]);
        // old(g) + old(x) == g
        let e = Expr::symbol("g").old().plus(Expr::symbol("x").old()).eq(Expr::symbol("g"));
        let result = e.substitute_replacing_old(&|n| always.get(&n).cloned(), &|n| {
            for_old.get(&n).cloned()
        });
        let expected = Expr::symbol("g").plus(Expr::symbol("x@0")).eq(Expr::symbol("g@2"));
        assert_eq!(result, expected);
    }

    #[test]
    fn applications_are_deduplicated() {
        let app = Expr::function_call("PSummaryPred", vec![Expr::symbol("x")]);
        let e = app.clone().and(app.clone().implies(Expr::function_call("Q", vec![])));
        assert_eq!(e.applications_of("PSummaryPred".into()), vec![app]);
    }
}
