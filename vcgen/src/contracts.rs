// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turn the contract of a procedure into commands of its implementation.
//!
//! Preconditions are assumed at a new entry block and postconditions are
//! asserted at the exit. Conditions written as block expressions are spliced
//! into the graph: their blocks are copied in and every `return e` becomes an
//! assumption (or assertion) of `e` followed by a jump to a continuation
//! block, which takes over as the insertion point for later clauses.

use crate::{Result, VcGenError};
use tracing::debug;
use vc_ast::{
    AssertCmd, AssertKind, BlockExpr, BlockId, Cmd, Condition, ContractExit, Expr, Implementation,
    IncarnationMap, InternedString, Procedure, Transfer,
};

const PRECONDITION_ENTRY_PREFIX: &str = "PreconditionGeneratedEntry";
const POSTCONDITION_EXIT_PREFIX: &str = "ReallyLastGeneratedExit";

/// What a `return e` of a spliced block expression turns into.
enum Splice {
    Assume,
    Assert(AssertKind),
}

impl Splice {
    fn cmd(&self, condition: Expr) -> Cmd {
        match self {
            Splice::Assume => Cmd::assume(condition),
            Splice::Assert(kind) => Cmd::Assert(AssertCmd::new(condition, kind.clone())),
        }
    }
}

/// Map procedure formals to the formals of the implementation, positionally.
fn formal_map(procedure: &Procedure, implementation: &Implementation) -> Result<IncarnationMap> {
    if procedure.in_params.len() != implementation.in_params.len()
        || procedure.out_params.len() != implementation.out_params.len()
    {
        return Err(VcGenError::Internal(format!(
            "implementation `{}` does not match the signature of its procedure",
            implementation.name
        )));
    }
    Ok(procedure
        .in_params
        .iter()
        .zip(&implementation.in_params)
        .chain(procedure.out_params.iter().zip(&implementation.out_params))
        .map(|(p, i)| (p.name, i.to_expr()))
        .collect())
}

fn fresh_block(implementation: &mut Implementation, prefix: &str, counter: &mut usize) -> BlockId {
    let label = implementation.fresh_label(&format!("{prefix}{counter}"));
    *counter += 1;
    implementation.add_block(label, Vec::new())
}

/// Copy `expr` into the graph after `insertion`, which must not have been
/// given its final transfer yet. The transfer of `insertion` moves to
/// `continuation`, and `continuation` is returned as the new insertion point.
fn thread_in_block_expr(
    implementation: &mut Implementation,
    insertion: BlockId,
    continuation: BlockId,
    expr: &BlockExpr,
    splice: &Splice,
) -> Result<BlockId> {
    if expr.blocks.is_empty() {
        return Err(VcGenError::Internal(format!(
            "empty block expression in the contract of `{}`",
            implementation.name
        )));
    }
    let ids: Vec<BlockId> = expr
        .blocks
        .iter()
        .map(|b| {
            let label = implementation.fresh_label(&b.label.to_owned_string());
            implementation.add_block(label, b.cmds.clone())
        })
        .collect();
    for (block, id) in expr.blocks.iter().zip(&ids) {
        match &block.exit {
            ContractExit::Goto { targets } => {
                let targets = targets
                    .iter()
                    .map(|t| {
                        ids.get(*t).copied().ok_or_else(|| {
                            VcGenError::Internal(format!(
                                "block `{}` of a block expression jumps to missing block {t}",
                                block.label
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                implementation.set_transfer(*id, Transfer::goto(targets));
            }
            ContractExit::Return { value } => {
                implementation.block_mut(*id).cmds.push(splice.cmd(value.clone()));
                implementation.set_transfer(*id, Transfer::goto(vec![continuation]));
            }
        }
    }
    let previous = implementation.block(insertion).transfer().clone();
    implementation.set_transfer(continuation, previous);
    implementation.set_transfer(insertion, Transfer::goto(vec![ids[0]]));
    Ok(continuation)
}

/// Assume the where-clauses of the formals and every precondition at a new
/// entry block that falls through to the old entry. Where-clauses declared on
/// procedure formals are also recorded on the implementation's formals.
pub(crate) fn inject_preconditions(
    procedure: &Procedure,
    implementation: &mut Implementation,
) -> Result<()> {
    let formals = formal_map(procedure, implementation)?;
    let subst = |n: InternedString| formals.get(&n).cloned();

    let declared = procedure.in_params.iter().chain(&procedure.out_params);
    let actual = implementation.in_params.iter_mut().chain(implementation.out_params.iter_mut());
    for (decl, formal) in declared.zip(actual) {
        if formal.where_clause.is_none() {
            formal.where_clause = decl.where_clause.as_ref().map(|w| w.substitute(&subst));
        }
    }
    let start_cmds: Vec<Cmd> = implementation
        .in_params
        .iter()
        .chain(&implementation.out_params)
        .filter_map(|v| v.where_clause.clone())
        .map(Cmd::assume)
        .collect();

    let original_entry = implementation.entry();
    let mut counter = 0;
    let entry = fresh_block(implementation, PRECONDITION_ENTRY_PREFIX, &mut counter);
    implementation.block_mut(entry).cmds = start_cmds;
    implementation.set_entry(entry);

    let mut insertion = entry;
    for requires in &procedure.requires {
        match requires.condition.substitute(&subst) {
            Condition::Expr(e) => implementation.block_mut(insertion).cmds.push(Cmd::assume(e)),
            Condition::Blocks(expr) => {
                let next = fresh_block(implementation, PRECONDITION_ENTRY_PREFIX, &mut counter);
                insertion =
                    thread_in_block_expr(implementation, insertion, next, &expr, &Splice::Assume)?;
            }
        }
    }
    implementation.set_transfer(insertion, Transfer::goto(vec![original_entry]));
    debug!(implementation = %implementation.name, requires = procedure.requires.len(), "injected preconditions");
    Ok(())
}

/// Assert every checked postcondition at `exit`, the only returning block.
/// Returns the returning block afterwards, which differs from `exit` when a
/// postcondition is a block expression.
pub(crate) fn inject_postconditions(
    procedure: &Procedure,
    implementation: &mut Implementation,
    exit: BlockId,
) -> Result<BlockId> {
    let formals = formal_map(procedure, implementation)?;
    let subst = |n: InternedString| formals.get(&n).cloned();

    let mut counter = 0;
    let mut insertion = exit;
    for ensures in procedure.ensures.iter().filter(|e| !e.free) {
        match ensures.condition.substitute(&subst) {
            Condition::Expr(e) => implementation
                .block_mut(insertion)
                .cmds
                .push(Cmd::assert_ensures(e, ensures.error_data.clone())),
            Condition::Blocks(expr) => {
                let next = fresh_block(implementation, POSTCONDITION_EXIT_PREFIX, &mut counter);
                let splice =
                    Splice::Assert(AssertKind::Ensures { error_data: ensures.error_data.clone() });
                insertion = thread_in_block_expr(implementation, insertion, next, &expr, &splice)?;
            }
        }
    }
    Ok(insertion)
}
