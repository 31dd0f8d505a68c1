// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Concrete evaluation of expressions over integer and boolean values.

use super::{BinaryOp, Expr, Literal, UnaryOp};
use crate::InternedString;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use std::fmt;
use thiserror::Error;

/// A concrete value, as found in a counterexample model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Int(BigInt),
    Bool(bool),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(i) => Some(i),
            Value::Bool(_) => None,
        }
    }

    /// The literal expression denoting this value.
    pub fn to_expr(&self) -> Expr {
        match self {
            Value::Int(i) => Expr::int_constant(i.clone()),
            Value::Bool(b) => Expr::bool_constant(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("no value for `{0}`")]
    Unbound(InternedString),
    #[error("no value for `old({0})`")]
    UnboundOld(InternedString),
    #[error("no interpretation for this application of `{0}`")]
    Uninterpreted(InternedString),
    #[error("ill-typed operands in `{0}`")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("bit-vector values are not supported")]
    BitVector,
}

/// Where evaluation finds the values of symbols and applications.
pub trait Valuation {
    fn symbol(&self, name: InternedString) -> Option<Value>;

    /// Value of `name` in the pre-state, i.e. of `old(name)`.
    fn old(&self, _name: InternedString) -> Option<Value> {
        None
    }

    fn application(&self, _symbol: InternedString, _arguments: &[Value]) -> Option<Value> {
        None
    }
}

impl Expr {
    /// Evaluate `self` under `valuation`. `&&`, `||` and `==>` short-circuit.
    /// `==` and `<==>` are the same operation on both integers and booleans.
    pub fn evaluate(&self, valuation: &dyn Valuation) -> Result<Value, EvalError> {
        self.eval_in(valuation, false)
    }

    fn eval_in(&self, valuation: &dyn Valuation, in_old: bool) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
            Expr::Literal(Literal::Int(i)) => Ok(Value::Int(i.clone())),
            Expr::Literal(Literal::Bv { .. }) => Err(EvalError::BitVector),
            Expr::Symbol { name } => {
                if in_old {
                    valuation.old(*name).ok_or(EvalError::UnboundOld(*name))
                } else {
                    valuation.symbol(*name).ok_or(EvalError::Unbound(*name))
                }
            }
            Expr::Old(e) => e.eval_in(valuation, true),
            Expr::UnaryOp { op, operand } => match (op, operand.eval_in(valuation, in_old)?) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
                _ => Err(self.mismatch()),
            },
            Expr::BinaryOp { op, left, right } => self.eval_binary(*op, left, right, valuation, in_old),
            Expr::FunctionCall { symbol, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|a| a.eval_in(valuation, in_old))
                    .collect::<Result<Vec<_>, _>>()?;
                valuation.application(*symbol, &arguments).ok_or(EvalError::Uninterpreted(*symbol))
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        valuation: &dyn Valuation,
        in_old: bool,
    ) -> Result<Value, EvalError> {
        let lhs = left.eval_in(valuation, in_old)?;
        // Short-circuit the connectives.
        match (op, &lhs) {
            (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
            (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
            (BinaryOp::Implies, Value::Bool(false)) => return Ok(Value::Bool(true)),
            _ => {}
        }
        let rhs = right.eval_in(valuation, in_old)?;
        let value = match (op, lhs, rhs) {
            (BinaryOp::And | BinaryOp::Or | BinaryOp::Implies, Value::Bool(_), Value::Bool(b)) => {
                Value::Bool(b)
            }
            (BinaryOp::Eq | BinaryOp::Iff, l, r) if same_kind(&l, &r) => Value::Bool(l == r),
            (BinaryOp::Neq, l, r) if same_kind(&l, &r) => Value::Bool(l != r),
            (BinaryOp::Lt, Value::Int(l), Value::Int(r)) => Value::Bool(l < r),
            (BinaryOp::Lte, Value::Int(l), Value::Int(r)) => Value::Bool(l <= r),
            (BinaryOp::Gt, Value::Int(l), Value::Int(r)) => Value::Bool(l > r),
            (BinaryOp::Gte, Value::Int(l), Value::Int(r)) => Value::Bool(l >= r),
            (BinaryOp::Add, Value::Int(l), Value::Int(r)) => Value::Int(l + r),
            (BinaryOp::Sub, Value::Int(l), Value::Int(r)) => Value::Int(l - r),
            (BinaryOp::Mul, Value::Int(l), Value::Int(r)) => Value::Int(l * r),
            (BinaryOp::Div, Value::Int(l), Value::Int(r)) => Value::Int(euclid(&l, &r)?.0),
            (BinaryOp::Mod, Value::Int(l), Value::Int(r)) => Value::Int(euclid(&l, &r)?.1),
            _ => return Err(self.mismatch()),
        };
        Ok(value)
    }

    fn mismatch(&self) -> EvalError {
        EvalError::TypeMismatch(self.to_string())
    }
}

fn same_kind(l: &Value, r: &Value) -> bool {
    matches!((l, r), (Value::Int(_), Value::Int(_)) | (Value::Bool(_), Value::Bool(_)))
}

/// Euclidean quotient and remainder: the remainder is never negative.
fn euclid(l: &BigInt, r: &BigInt) -> Result<(BigInt, BigInt), EvalError> {
    if r.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    let mut q = l / r;
    let mut m = l % r;
    if m.is_negative() {
        if r.is_positive() {
            q -= BigInt::one();
            m += r;
        } else {
            q += BigInt::one();
            m -= r;
        }
    }
    Ok((q, m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct State(BTreeMap<InternedString, Value>);

    impl Valuation for State {
        fn symbol(&self, name: InternedString) -> Option<Value> {
            self.0.get(&name).cloned()
        }

        fn old(&self, name: InternedString) -> Option<Value> {
            self.0.get(&name.old_name()).cloned()
        }
    }

    fn state(pairs: &[(&str, Value)]) -> State {
        State(pairs.iter().map(|(n, v)| (InternedString::from(n), v.clone())).collect())
    }

    #[test]
    fn equality_and_equivalence_agree() {
        let s = state(&[("a", Value::Bool(true)), ("b", Value::Bool(true))]);
        let eq = Expr::symbol("a").eq(Expr::symbol("b"));
        let iff = Expr::symbol("a").iff(Expr::symbol("b"));
        assert_eq!(eq.evaluate(&s), Ok(Value::Bool(true)));
        assert_eq!(iff.evaluate(&s), Ok(Value::Bool(true)));
    }

    #[test]
    fn old_reads_the_pre_state() {
        let s = state(&[("g", Value::Int(5.into())), ("old(g)", Value::Int(3.into()))]);
        let e = Expr::symbol("g").sub(Expr::symbol("g").old());
        assert_eq!(e.evaluate(&s), Ok(Value::Int(2.into())));
    }

    #[test]
    fn division_is_euclidean() {
        let s = state(&[]);
        let div = Expr::int_constant(-7).div(Expr::int_constant(2));
        let rem = Expr::int_constant(-7).rem(Expr::int_constant(2));
        assert_eq!(div.evaluate(&s), Ok(Value::Int((-4).into())));
        assert_eq!(rem.evaluate(&s), Ok(Value::Int(1.into())));
        let by_zero = Expr::int_constant(1).div(Expr::int_constant(0));
        assert_eq!(by_zero.evaluate(&s), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn connectives_short_circuit() {
        let s = state(&[("b", Value::Bool(false))]);
        let e = Expr::symbol("b").implies(Expr::symbol("unbound"));
        assert_eq!(e.evaluate(&s), Ok(Value::Bool(true)));
        let e = Expr::symbol("unbound").and(Expr::symbol("b"));
        assert_eq!(e.evaluate(&s), Err(EvalError::Unbound("unbound".into())));
    }

    #[test]
    fn ill_typed_operands_are_reported() {
        let s = state(&[("b", Value::Bool(false))]);
        let e = Expr::symbol("b").plus(Expr::int_constant(1));
        assert!(matches!(e.evaluate(&s), Err(EvalError::TypeMismatch(_))));
    }
}
