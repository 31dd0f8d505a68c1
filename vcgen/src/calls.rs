// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Replace every call by the contract of its callee.
//!
//! `call r := Q(e)` becomes a scope with temporaries:
//! ```text
//! {
//!   var callKformalx, callKoldg;
//!   assert Q.requires[x := e];
//!   callKformalx, callKoldg := e, g;
//!   havoc r, g;
//!   assume Q.ensures[x := callKformalx, Q.r := r, old(g) := callKoldg];
//! }
//! ```
//! where `g` ranges over the globals `Q` modifies.

use crate::{Result, VcGenError};
use tracing::debug;
use vc_ast::{
    AssertCmd, AssertKind, Cmd, Condition, Expr, Implementation, IncarnationMap, InternedString,
    Procedure, Program, Variable,
};

pub(crate) fn desugar_calls(program: &Program, implementation: &mut Implementation) -> Result<usize> {
    let mut counter = 0;
    let caller = implementation.name;
    for id in implementation.block_ids() {
        let cmds = std::mem::take(&mut implementation.block_mut(id).cmds);
        implementation.block_mut(id).cmds = desugar_cmds(program, caller, cmds, &mut counter)?;
    }
    if counter > 0 {
        debug!(implementation = %caller, calls = counter, "desugared calls");
    }
    Ok(counter)
}

fn desugar_cmds(
    program: &Program,
    caller: InternedString,
    cmds: Vec<Cmd>,
    counter: &mut usize,
) -> Result<Vec<Cmd>> {
    cmds.into_iter()
        .map(|cmd| match cmd {
            Cmd::Call { callee, arguments, outputs } => {
                let k = *counter;
                *counter += 1;
                desugar_call(program, caller, callee, &arguments, &outputs, k)
            }
            Cmd::Scope { locals, cmds } => {
                Ok(Cmd::Scope { locals, cmds: desugar_cmds(program, caller, cmds, counter)? })
            }
            other => Ok(other),
        })
        .collect()
}

fn plain_condition<'c>(
    condition: &'c Condition,
    caller: InternedString,
    callee: InternedString,
) -> Result<&'c Expr> {
    condition.as_expr().ok_or_else(|| {
        VcGenError::Internal(format!(
            "call from `{caller}` to `{callee}`: block expressions are not supported in callee contracts"
        ))
    })
}

fn desugar_call(
    program: &Program,
    caller: InternedString,
    callee: InternedString,
    arguments: &[Expr],
    outputs: &[InternedString],
    k: usize,
) -> Result<Cmd> {
    let procedure: &Procedure = program.procedure(callee).ok_or_else(|| {
        VcGenError::Internal(format!("`{caller}` calls undeclared procedure `{callee}`"))
    })?;
    if arguments.len() != procedure.in_params.len() || outputs.len() != procedure.out_params.len() {
        return Err(VcGenError::Internal(format!(
            "call from `{caller}` to `{callee}` has the wrong number of arguments or results"
        )));
    }

    let actuals: IncarnationMap =
        procedure.in_params.iter().zip(arguments).map(|(f, a)| (f.name, a.clone())).collect();
    let mut cmds = Vec::new();
    for requires in procedure.requires.iter().filter(|r| !r.free) {
        let condition = plain_condition(&requires.condition, caller, callee)?;
        cmds.push(Cmd::Assert(AssertCmd::new(
            condition.substitute(&|n| actuals.get(&n).cloned()),
            AssertKind::Requires { callee },
        )));
    }

    let mut locals = Vec::new();
    let mut assignments = Vec::new();
    let mut ins = IncarnationMap::new();
    for (formal, argument) in procedure.in_params.iter().zip(arguments) {
        let temp = InternedString::from(format!("call{k}formal{}", formal.name));
        locals.push(Variable::local(temp, formal.typ.clone()));
        assignments.push((temp, argument.clone()));
        ins.insert(formal.name, Expr::symbol(temp));
    }
    let mut olds = IncarnationMap::new();
    for global in &procedure.modifies {
        let declaration = program.global(*global).ok_or_else(|| {
            VcGenError::Internal(format!("`{callee}` modifies undeclared global `{global}`"))
        })?;
        let temp = InternedString::from(format!("call{k}old{global}"));
        locals.push(Variable::local(temp, declaration.typ.clone()));
        assignments.push((temp, Expr::symbol(*global)));
        olds.insert(*global, Expr::symbol(temp));
    }
    if !assignments.is_empty() {
        cmds.push(Cmd::Assign { pairs: assignments });
    }

    let mut havocked: Vec<InternedString> = outputs.to_vec();
    for global in &procedure.modifies {
        if !havocked.contains(global) {
            havocked.push(*global);
        }
    }
    if !havocked.is_empty() {
        cmds.push(Cmd::havoc(havocked));
    }

    let outs: IncarnationMap =
        procedure.out_params.iter().zip(outputs).map(|(f, o)| (f.name, Expr::symbol(*o))).collect();
    let always = |n: InternedString| ins.get(&n).or_else(|| outs.get(&n)).cloned();
    let for_old = |n: InternedString| olds.get(&n).cloned();
    for ensures in &procedure.ensures {
        let condition = plain_condition(&ensures.condition, caller, callee)?;
        cmds.push(Cmd::assume(condition.substitute_replacing_old(&always, &for_old)));
    }
    Ok(Cmd::Scope { locals, cmds })
}
