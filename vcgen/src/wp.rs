// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Weakest preconditions of passive block graphs.

use crate::{Result, VcEncoding, VcGenError};
use std::collections::{BTreeMap, BTreeSet};
use vc_ast::{Block, BlockId, Cmd, Expr, Implementation, InternedString, Type};

/// `post` pulled back through the commands of `block`.
fn block_wp(block: &Block, post: Expr) -> Result<Expr> {
    block.cmds.iter().rev().try_fold(post, |q, cmd| match cmd {
        Cmd::Assert(a) => Ok(a.condition.clone().and_simp(q)),
        Cmd::Assume { condition } => Ok(condition.clone().implies_simp(q)),
        other => Err(VcGenError::Internal(format!(
            "block `{}` is not passive: `{other}`",
            block.label
        ))),
    })
}

/// The verification condition of a passive implementation, and the block
/// variables it introduces.
pub(crate) fn encode(
    implementation: &Implementation,
    order: &[BlockId],
    encoding: VcEncoding,
) -> Result<(Expr, Vec<(InternedString, Type)>)> {
    match encoding {
        VcEncoding::Inline => Ok((inline(implementation, order)?, Vec::new())),
        VcEncoding::BlockVariables => block_variables(implementation, order),
    }
}

fn missing(implementation: &Implementation, id: BlockId) -> VcGenError {
    VcGenError::Internal(format!("block {id} of `{}` was not visited", implementation.name))
}

fn inline(implementation: &Implementation, order: &[BlockId]) -> Result<Expr> {
    let mut wp: BTreeMap<BlockId, Expr> = BTreeMap::new();
    for id in order.iter().rev() {
        let block = implementation.block(*id);
        let post = block
            .successors()
            .iter()
            .map(|s| wp.get(s).cloned().ok_or_else(|| missing(implementation, *s)))
            .collect::<Result<Vec<_>>>()?;
        wp.insert(*id, block_wp(block, Expr::and_all(post))?);
    }
    let entry = implementation.entry();
    wp.remove(&entry).ok_or_else(|| missing(implementation, entry))
}

fn block_variables(
    implementation: &Implementation,
    order: &[BlockId],
) -> Result<(Expr, Vec<(InternedString, Type)>)> {
    let mut names: BTreeMap<BlockId, InternedString> = BTreeMap::new();
    let mut taken = BTreeSet::new();
    for id in order {
        let label = implementation.block(*id).label;
        let mut name = format!("{label}_correct");
        if !taken.insert(name.clone()) {
            name = format!("{label}_{}_correct", id.index());
            taken.insert(name.clone());
        }
        names.insert(*id, name.into());
    }
    let var = |id: BlockId| {
        names.get(&id).map(|n| Expr::symbol(*n)).ok_or_else(|| missing(implementation, id))
    };

    let mut definitions = Vec::with_capacity(order.len());
    for id in order {
        let block = implementation.block(*id);
        let post = block.successors().iter().map(|s| var(*s)).collect::<Result<Vec<_>>>()?;
        definitions.push(var(*id)?.iff(block_wp(block, Expr::and_all(post))?));
    }
    let formula = Expr::and_all(definitions).implies(var(implementation.entry())?);
    let symbols = order.iter().filter_map(|id| names.get(id)).map(|n| (*n, Type::Bool)).collect();
    Ok((formula, symbols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VcGenOptions, VcGenerator};
    use vc_ast::{Ensures, Procedure, Program, Transfer, Valuation, Value, Variable};

    #[test]
    fn inline_encoding_of_straight_line_code() {
        let mut imp = Implementation::new("P".into(), vec![], vec![]);
        let entry = imp.add_block(
            "entry",
            vec![
                Cmd::assume(Expr::symbol("a")),
                Cmd::assert(Expr::symbol("b")),
            ],
        );
        let (formula, symbols) = encode(&imp, &[entry], VcEncoding::Inline).unwrap();
        assert_eq!(formula, Expr::symbol("a").implies(Expr::symbol("b")));
        assert!(symbols.is_empty());
    }

    #[test]
    fn block_variables_define_each_block() {
        let mut imp = Implementation::new("P".into(), vec![], vec![]);
        let entry = imp.add_block("entry", vec![Cmd::assume(Expr::symbol("a"))]);
        let exit = imp.add_block("exit", vec![Cmd::assert(Expr::symbol("b"))]);
        imp.set_transfer(entry, Transfer::goto(vec![exit]));
        let (formula, symbols) = encode(&imp, &[entry, exit], VcEncoding::BlockVariables).unwrap();
        let entry_ok = Expr::symbol("entry_correct");
        let exit_ok = Expr::symbol("exit_correct");
        let expected = entry_ok
            .clone()
            .iff(Expr::symbol("a").implies(exit_ok.clone()))
            .and(exit_ok.iff(Expr::symbol("b")))
            .implies(entry_ok);
        assert_eq!(formula, expected);
        assert_eq!(symbols.len(), 2);
    }

    #[test]
    fn non_passive_command_is_internal() {
        let mut imp = Implementation::new("P".into(), vec![], vec![]);
        let entry = imp.add_block("entry", vec![Cmd::havoc(vec!["x".into()])]);
        assert!(matches!(encode(&imp, &[entry], VcEncoding::Inline), Err(VcGenError::Internal(_))));
    }

    struct Ints(Vec<(&'static str, i64)>);

    impl Valuation for Ints {
        fn symbol(&self, name: InternedString) -> Option<Value> {
            self.0.iter().find(|(n, _)| name == *n).map(|(_, v)| Value::Int((*v).into()))
        }
    }

    /// `P(x) returns (r) ensures r > x { r := x + 1 }`, checked by evaluating
    /// the inline condition on a few inputs.
    #[test]
    fn generated_condition_is_valid_for_correct_code() {
        let mut program = Program::new();
        let mut p = Procedure::new(
            "P".into(),
            vec![Variable::in_param("x".into(), Type::Int)],
            vec![Variable::out_param("r".into(), Type::Int)],
        );
        p.ensures.push(Ensures::new(Expr::symbol("r").gt(Expr::symbol("x"))));
        program.add_procedure(p);
        let mut imp = Implementation::new(
            "P".into(),
            vec![Variable::in_param("x".into(), Type::Int)],
            vec![Variable::out_param("r".into(), Type::Int)],
        );
        imp.add_block(
            "entry",
            vec![Cmd::assign("r".into(), Expr::symbol("x").plus(Expr::int_constant(1)))],
        );
        let options = VcGenOptions { encoding: VcEncoding::Inline, ..VcGenOptions::default() };
        let generator = VcGenerator::new(&program, options);
        let (_, vc) = generator.verification_condition(&imp).unwrap();
        assert_eq!(vc.symbols.len(), 2);
        assert!(vc.block_variables.is_empty());

        for x in -3..3 {
            let good = Ints(vec![("x", x), ("r@0", x + 1)]);
            assert_eq!(vc.formula.evaluate(&good), Ok(Value::Bool(true)));
            let off = Ints(vec![("x", x), ("r@0", x)]);
            assert_eq!(vc.formula.evaluate(&off), Ok(Value::Bool(true)));
        }

        let generator = VcGenerator::new(&program, VcGenOptions::default());
        let (passive, vc) = generator.verification_condition(&imp).unwrap();
        assert_eq!(vc.block_variables.len(), passive.order.len());
        for block in &vc.block_variables {
            assert!(block.ends_with("_correct"));
            assert!(vc.symbols.iter().any(|(s, t)| s == block && *t == Type::Bool));
        }
    }
}
