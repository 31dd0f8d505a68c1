// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion of a loop-free body into passive form.
//!
//! Blocks are visited in topological order. Each block starts from the merge
//! of its predecessors' exit maps: a variable keeps its incarnation when all
//! predecessors agree on it; otherwise a fresh incarnation is minted and every
//! predecessor is told, through a trailing assumption, which value it carries.
//! Inside a block, every assignment and havoc mints incarnations, so the result
//! only contains assertions and assumptions and every incarnation is defined at
//! most once.

use crate::liveness::Liveness;
use crate::{Result, VcGenError, VcGenOptions};
use std::collections::BTreeMap;
use tracing::trace;
use vc_ast::{
    AssertCmd, BlockId, Cmd, Expr, Implementation, IncarnationMap, InternedString, Procedure,
    Program, Transfer, Variable, VariableKind,
};

/// Why an incarnation was minted, with the label of the block it happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncarnationOrigin {
    /// Reconciles predecessors that disagree at a join point
    JoinPoint { block: InternedString },
    Assignment { block: InternedString },
    Havoc { block: InternedString },
}

/// An implementation whose blocks only contain assertions and assumptions,
/// with the bookkeeping needed to relate it back to the source.
#[derive(Clone, Debug)]
pub struct PassiveImplementation {
    pub implementation: Implementation,
    /// Reachable blocks in the order they were passified.
    pub order: Vec<BlockId>,
    /// The only returning block.
    pub exit: BlockId,
    /// What every variable stands for at the end of `exit`.
    pub exit_map: IncarnationMap,
    pub incarnation_origins: BTreeMap<InternedString, IncarnationOrigin>,
    /// Transfers replaced while unifying the exits.
    pub goto_origins: BTreeMap<BlockId, Transfer>,
}

pub(crate) struct Passifier<'a> {
    options: &'a VcGenOptions,
    declarations: BTreeMap<InternedString, Variable>,
    /// Substitution for `old(g)`: modified globals denote their entry value.
    old_frame: IncarnationMap,
    sequence: BTreeMap<InternedString, usize>,
    origins: BTreeMap<InternedString, IncarnationOrigin>,
    incarnations: Vec<Variable>,
    scope_locals: Vec<Variable>,
}

fn collect_scope_locals(cmd: &Cmd, declarations: &mut BTreeMap<InternedString, Variable>) {
    if let Cmd::Scope { locals, cmds } = cmd {
        for local in locals {
            declarations.insert(local.name, local.clone());
        }
        cmds.iter().for_each(|c| collect_scope_locals(c, declarations));
    }
}

impl<'a> Passifier<'a> {
    pub(crate) fn new(
        program: &Program,
        procedure: &Procedure,
        implementation: &Implementation,
        options: &'a VcGenOptions,
    ) -> Self {
        let mut declarations = BTreeMap::new();
        for var in program
            .globals
            .iter()
            .chain(&implementation.in_params)
            .chain(&implementation.out_params)
            .chain(&implementation.locals)
        {
            declarations.insert(var.name, var.clone());
        }
        for block in implementation.blocks() {
            block.cmds.iter().for_each(|c| collect_scope_locals(c, &mut declarations));
        }
        let old_frame = procedure.modifies.iter().map(|g| (*g, Expr::symbol(*g))).collect();
        Passifier {
            options,
            declarations,
            old_frame,
            sequence: BTreeMap::new(),
            origins: BTreeMap::new(),
            incarnations: Vec::new(),
            scope_locals: Vec::new(),
        }
    }

    pub(crate) fn into_origins(self) -> BTreeMap<InternedString, IncarnationOrigin> {
        self.origins
    }

    /// Passify every reachable block of `implementation` in place. Returns the
    /// order blocks were visited in, the returning block and its exit map.
    /// Minted incarnations and scope locals are added to the locals.
    pub(crate) fn passify(
        &mut self,
        implementation: &mut Implementation,
    ) -> Result<(Vec<BlockId>, BlockId, IncarnationMap)> {
        let name = implementation.name;
        let order = implementation
            .topological_order()
            .map_err(|reason| VcGenError::structural(name, reason))?;
        let liveness = self
            .options
            .prune_dead_incarnations
            .then(|| Liveness::compute(implementation, &order, &self.declarations));

        let mut exit_maps: BTreeMap<BlockId, IncarnationMap> = BTreeMap::new();
        for id in &order {
            let preds: Vec<BlockId> = implementation
                .block(*id)
                .predecessors()
                .iter()
                .copied()
                .filter(|p| exit_maps.contains_key(p))
                .collect();
            let entry_map = if preds.is_empty() {
                IncarnationMap::new()
            } else {
                self.merge(implementation, *id, &preds, &exit_maps, liveness.as_ref())?
            };
            let label = implementation.block(*id).label;
            let cmds = std::mem::take(&mut implementation.block_mut(*id).cmds);
            let mut map = entry_map;
            let mut passive = Vec::with_capacity(cmds.len());
            for cmd in cmds {
                self.passify_cmd(label, cmd, &mut map, &mut passive)?;
            }
            implementation.block_mut(*id).cmds = passive;
            exit_maps.insert(*id, map);
        }

        let exits: Vec<BlockId> = order
            .iter()
            .copied()
            .filter(|id| implementation.block(*id).transfer().is_return())
            .collect();
        let [exit] = exits[..] else {
            return Err(VcGenError::Internal(format!(
                "`{name}` has {} returning blocks after unification",
                exits.len()
            )));
        };
        let exit_map = exit_maps.remove(&exit).unwrap_or_default();

        for local in self.scope_locals.drain(..) {
            if implementation.variable(local.name).is_none() {
                implementation.locals.push(local);
            }
        }
        implementation.locals.append(&mut self.incarnations);
        trace!(implementation = %name, incarnations = self.origins.len(), "passified");
        Ok((order, exit, exit_map))
    }

    /// The incarnation map at the entry of `id`. Appends join assumptions to
    /// the predecessors for every variable they disagree on.
    fn merge(
        &mut self,
        implementation: &mut Implementation,
        id: BlockId,
        preds: &[BlockId],
        exit_maps: &BTreeMap<BlockId, IncarnationMap>,
        liveness: Option<&Liveness>,
    ) -> Result<IncarnationMap> {
        let label = implementation.block(id).label;
        let pred_maps: Vec<(BlockId, &IncarnationMap)> =
            preds.iter().filter_map(|p| exit_maps.get(p).map(|m| (*p, m))).collect();
        let Some((_, first)) = pred_maps.first() else {
            return Ok(IncarnationMap::new());
        };

        let mut merged = IncarnationMap::new();
        let mut conflicts = Vec::new();
        let mut names: Vec<InternedString> =
            pred_maps.iter().flat_map(|(_, m)| m.keys().copied()).collect();
        names.sort();
        names.dedup();
        for var in names {
            match first.get(&var) {
                Some(e) if pred_maps.iter().all(|(_, m)| m.get(&var) == Some(e)) => {
                    merged.insert(var, e.clone());
                }
                _ => conflicts.push(var),
            }
        }

        for var in conflicts {
            if liveness.is_some_and(|l| !l.is_live(id, var)) {
                trace!(%var, block = %label, "dropped dead variable at join");
                continue;
            }
            let fresh = self.create_incarnation(var, IncarnationOrigin::JoinPoint { block: label })?;
            for (pred, map) in &pred_maps {
                let current = map.get(&var).cloned().unwrap_or_else(|| Expr::symbol(var));
                implementation.block_mut(*pred).cmds.push(Cmd::assume(Expr::symbol(fresh).eq(current)));
            }
            merged.insert(var, Expr::symbol(fresh));
        }
        Ok(merged)
    }

    fn passify_cmd(
        &mut self,
        block: InternedString,
        cmd: Cmd,
        map: &mut IncarnationMap,
        out: &mut Vec<Cmd>,
    ) -> Result<()> {
        match cmd {
            Cmd::Assert(assert) => {
                let condition = self.substitute(&assert.condition, map);
                out.push(Cmd::Assert(AssertCmd {
                    condition,
                    kind: assert.kind,
                    original: Some(assert.condition),
                    incarnation_map: Some(map.clone()),
                }));
            }
            Cmd::Assume { condition } => out.push(Cmd::assume(self.substitute(&condition, map))),
            Cmd::Assign { pairs } => {
                let rhss: Vec<Expr> = pairs.iter().map(|(_, rhs)| self.substitute(rhs, map)).collect();
                let mut equalities = Vec::new();
                for ((lhs, _), rhs) in pairs.into_iter().zip(rhss) {
                    if !self.declarations.contains_key(&lhs) {
                        return Err(VcGenError::Internal(format!(
                            "assignment to undeclared variable `{lhs}`"
                        )));
                    }
                    if self.is_incarnation(lhs) {
                        equalities.push(Expr::symbol(lhs).eq(rhs));
                        continue;
                    }
                    match rhs {
                        Expr::Literal(_) | Expr::Symbol { .. } => {
                            map.insert(lhs, rhs);
                        }
                        _ => {
                            let fresh = self.create_incarnation(lhs, IncarnationOrigin::Assignment { block })?;
                            equalities.push(Expr::symbol(fresh).eq(rhs));
                            map.insert(lhs, Expr::symbol(fresh));
                        }
                    }
                }
                if !equalities.is_empty() {
                    out.push(Cmd::assume(Expr::and_all(equalities)));
                }
            }
            Cmd::Havoc { vars } => {
                for var in &vars {
                    if self.is_incarnation(*var) {
                        continue;
                    }
                    let fresh = self.create_incarnation(*var, IncarnationOrigin::Havoc { block })?;
                    map.insert(*var, Expr::symbol(fresh));
                }
                for var in &vars {
                    let where_clause =
                        self.declarations.get(var).and_then(|d| d.where_clause.clone());
                    if let Some(w) = where_clause {
                        out.push(Cmd::assume(self.substitute(&w, map)));
                    }
                }
            }
            Cmd::Call { callee, .. } => {
                return Err(VcGenError::Internal(format!(
                    "call to `{callee}` in block `{block}` was not desugared"
                )));
            }
            Cmd::Comment(_) => {}
            Cmd::Scope { locals, cmds } => {
                for local in &locals {
                    self.declarations.insert(local.name, local.clone());
                    if !self.scope_locals.iter().any(|l| l.name == local.name) {
                        self.scope_locals.push(local.clone());
                    }
                }
                for local in &locals {
                    if let Some(w) = &local.where_clause {
                        out.push(Cmd::assume(self.substitute(w, map)));
                    }
                }
                for cmd in cmds {
                    self.passify_cmd(block, cmd, map, out)?;
                }
                for local in &locals {
                    map.remove(&local.name);
                }
            }
        }
        Ok(())
    }

    fn substitute(&self, e: &Expr, map: &IncarnationMap) -> Expr {
        e.substitute_replacing_old(&|n| map.get(&n).cloned(), &|n| self.old_frame.get(&n).cloned())
    }

    fn is_incarnation(&self, var: InternedString) -> bool {
        self.declarations.get(&var).is_some_and(Variable::is_incarnation)
    }

    fn create_incarnation(
        &mut self,
        var: InternedString,
        origin: IncarnationOrigin,
    ) -> Result<InternedString> {
        let typ = self
            .declarations
            .get(&var)
            .map(|d| d.typ.clone())
            .ok_or_else(|| VcGenError::Internal(format!("variable `{var}` is not declared")))?;
        let counter = self.sequence.entry(var).or_insert(0);
        let sequence = *counter;
        *counter += 1;
        let name = var.incarnation(sequence);
        let incarnation =
            Variable::new(name, typ, VariableKind::Incarnation { original: var, sequence });
        trace!(%name, ?origin, "new incarnation");
        self.declarations.insert(name, incarnation.clone());
        self.incarnations.push(incarnation);
        self.origins.insert(name, origin);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::IncarnationOrigin;
    use crate::{VcGenOptions, VcGenerator};
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};
    use vc_ast::{
        BinaryOp, BlockId, Cmd, Ensures, Expr, Implementation, InternedString, Procedure, Program,
        Transfer, Type, Variable, VariableKind,
    };

    /// `P(x) returns (r)` with locals `y`, `z` and global `g`, `P` modifies `g`.
    fn program(imp: Implementation) -> Program {
        let mut program = Program::new();
        program.add_global(Variable::global("g".into(), Type::Int));
        let mut p = Procedure::new(
            "P".into(),
            vec![Variable::in_param("x".into(), Type::Int)],
            vec![Variable::out_param("r".into(), Type::Int)],
        );
        p.modifies.push("g".into());
        program.add_procedure(p);
        program.add_implementation(imp);
        program
    }

    fn implementation() -> Implementation {
        let mut imp = Implementation::new(
            "P".into(),
            vec![Variable::in_param("x".into(), Type::Int)],
            vec![Variable::out_param("r".into(), Type::Int)],
        );
        imp.locals.push(Variable::local("y".into(), Type::Int));
        imp.locals.push(Variable::local("z".into(), Type::Int));
        imp
    }

    fn passify(imp: Implementation) -> crate::PassiveImplementation {
        let program = program(imp);
        let generator = VcGenerator::new(&program, VcGenOptions::default());
        generator.passify_implementation(&program.implementations[0]).unwrap()
    }

    fn assumes(imp: &Implementation, label: &str) -> Vec<Expr> {
        let id = imp.find_block(label).unwrap();
        imp.block(id)
            .cmds
            .iter()
            .filter_map(|c| match c {
                Cmd::Assume { condition } => Some(condition.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn literal_and_symbol_assignments_alias() {
        let mut imp = implementation();
        imp.add_block(
            "entry",
            vec![
                Cmd::assign("y".into(), Expr::int_constant(3)),
                Cmd::assign("z".into(), Expr::symbol("y")),
                Cmd::assign("r".into(), Expr::symbol("z").plus(Expr::symbol("x"))),
            ],
        );
        let passive = passify(imp);
        assert_eq!(
            assumes(&passive.implementation, "entry"),
            vec![Expr::symbol("r@0").eq(Expr::int_constant(3).plus(Expr::symbol("x")))]
        );
        assert_eq!(passive.exit_map.get(&"y".into()), Some(&Expr::int_constant(3)));
        assert_eq!(passive.exit_map.get(&"z".into()), Some(&Expr::int_constant(3)));
        assert_eq!(passive.exit_map.get(&"r".into()), Some(&Expr::symbol("r@0")));
    }

    #[test]
    fn diamond_join_mints_one_incarnation() {
        // entry: goto then, else
        // then: r := x + 1; goto join    else: r := x - 1; goto join
        // join: assert r != x
        let mut imp = implementation();
        let entry = imp.add_block("entry", vec![]);
        let then = imp.add_block(
            "then",
            vec![Cmd::assign("r".into(), Expr::symbol("x").plus(Expr::int_constant(1)))],
        );
        let els = imp.add_block(
            "else",
            vec![Cmd::assign("r".into(), Expr::symbol("x").sub(Expr::int_constant(1)))],
        );
        let join = imp.add_block("join", vec![Cmd::assert(Expr::symbol("r").neq(Expr::symbol("x")))]);
        imp.set_transfer(entry, Transfer::goto(vec![then, els]));
        imp.set_transfer(then, Transfer::goto(vec![join]));
        imp.set_transfer(els, Transfer::goto(vec![join]));

        let passive = passify(imp);
        let imp = &passive.implementation;
        assert_eq!(
            assumes(imp, "then"),
            vec![
                Expr::symbol("r@0").eq(Expr::symbol("x").plus(Expr::int_constant(1))),
                Expr::symbol("r@2").eq(Expr::symbol("r@0")),
            ]
        );
        assert_eq!(
            assumes(imp, "else"),
            vec![
                Expr::symbol("r@1").eq(Expr::symbol("x").sub(Expr::int_constant(1))),
                Expr::symbol("r@2").eq(Expr::symbol("r@1")),
            ]
        );
        let join = imp.find_block("join").unwrap();
        let Cmd::Assert(assert) = &imp.block(join).cmds[0] else {
            panic!("assertion disappeared");
        };
        assert_eq!(assert.condition, Expr::symbol("r@2").neq(Expr::symbol("x")));
        assert_eq!(assert.original, Some(Expr::symbol("r").neq(Expr::symbol("x"))));
        assert_eq!(
            passive.incarnation_origins.get(&"r@2".into()),
            Some(&super::IncarnationOrigin::JoinPoint { block: "join".into() })
        );
    }

    #[test]
    fn dead_variables_are_not_merged() {
        let mut imp = implementation();
        let entry = imp.add_block("entry", vec![]);
        let then = imp.add_block("then", vec![Cmd::havoc(vec!["y".into()])]);
        let els = imp.add_block("else", vec![Cmd::havoc(vec!["y".into()])]);
        let join = imp.add_block("join", vec![]);
        imp.set_transfer(entry, Transfer::goto(vec![then, els]));
        imp.set_transfer(then, Transfer::goto(vec![join]));
        imp.set_transfer(els, Transfer::goto(vec![join]));

        let passive = passify(imp.clone());
        assert!(assumes(&passive.implementation, "then").is_empty());
        assert!(!passive.exit_map.contains_key(&"y".into()));

        let program = program(imp);
        let options = VcGenOptions { prune_dead_incarnations: false, ..VcGenOptions::default() };
        let generator = VcGenerator::new(&program, options);
        let passive = generator.passify_implementation(&program.implementations[0]).unwrap();
        assert_eq!(
            assumes(&passive.implementation, "then"),
            vec![Expr::symbol("y@2").eq(Expr::symbol("y@0"))]
        );
    }

    #[test]
    fn havoc_assumes_where_clause_of_new_incarnation() {
        let mut imp = implementation();
        imp.locals[1] = Variable::local("z".into(), Type::Int)
            .with_where_clause(Expr::symbol("z").ge(Expr::int_constant(0)));
        imp.add_block(
            "entry",
            vec![Cmd::havoc(vec!["z".into()]), Cmd::assert(Expr::symbol("z").ge(Expr::int_constant(0)))],
        );
        let passive = passify(imp);
        assert_eq!(
            assumes(&passive.implementation, "entry"),
            vec![Expr::symbol("z@0").ge(Expr::int_constant(0))]
        );
    }

    #[test]
    fn old_of_modified_global_is_its_entry_value() {
        let mut imp = implementation();
        imp.add_block(
            "entry",
            vec![
                Cmd::assign("g".into(), Expr::symbol("g").plus(Expr::int_constant(1))),
                Cmd::assert(Expr::symbol("g").gt(Expr::symbol("g").old())),
            ],
        );
        let passive = passify(imp);
        let entry = passive.implementation.find_block("entry").unwrap();
        let Cmd::Assert(assert) = &passive.implementation.block(entry).cmds[1] else {
            panic!("assertion disappeared");
        };
        assert_eq!(assert.condition, Expr::symbol("g@0").gt(Expr::symbol("g")));
    }

    #[test]
    fn postconditions_and_calls_are_passive_after_the_pipeline() {
        let mut imp = implementation();
        imp.add_block(
            "entry",
            vec![Cmd::call("P".into(), vec![Expr::symbol("x")], vec!["y".into()])],
        );
        let mut program = program(imp);
        program.procedures[0].ensures.push(Ensures::new(Expr::symbol("r").ge(Expr::symbol("x"))));
        let generator = VcGenerator::new(&program, VcGenOptions::default());
        let passive = generator.passify_implementation(&program.implementations[0]).unwrap();
        for id in &passive.order {
            assert!(passive.implementation.block(*id).cmds.iter().all(Cmd::is_passive));
        }
        assert!(passive.implementation.variable("call0formalx".into()).is_some());
        assert!(passive.implementation.variable("g@0".into()).is_some());
    }

    #[test]
    fn conflicting_preds_without_entries_compare_to_the_variable() {
        // entry: goto a, b   a: y := x + 1; goto join   b: goto join   join: assert y > 0
        let mut imp = implementation();
        let entry = imp.add_block("entry", vec![]);
        let a = imp.add_block(
            "a",
            vec![Cmd::assign("y".into(), Expr::symbol("x").plus(Expr::int_constant(1)))],
        );
        let b = imp.add_block("b", vec![]);
        let join = imp.add_block("join", vec![Cmd::assert(Expr::symbol("y").gt(Expr::int_constant(0)))]);
        imp.set_transfer(entry, Transfer::goto(vec![a, b]));
        imp.set_transfer(a, Transfer::goto(vec![join]));
        imp.set_transfer(b, Transfer::goto(vec![join]));
        let passive = passify(imp);
        assert_eq!(assumes(&passive.implementation, "b"), vec![Expr::symbol("y@1").eq(Expr::symbol("y"))]);
    }

    /// Every path from `from` to a returning block.
    fn paths(imp: &Implementation, from: BlockId) -> Vec<Vec<BlockId>> {
        let successors = imp.block(from).successors();
        if successors.is_empty() {
            return vec![vec![from]];
        }
        let mut result = Vec::new();
        for succ in successors {
            for mut rest in paths(imp, *succ) {
                rest.insert(0, from);
                result.push(rest);
            }
        }
        result
    }

    /// Incarnations fixed by an `x@N == e` conjunct of `condition`.
    fn defined_by(condition: &Expr, incarnations: &BTreeSet<InternedString>, out: &mut Vec<InternedString>) {
        match condition {
            Expr::BinaryOp { op: BinaryOp::And, left, right } => {
                defined_by(left, incarnations, out);
                defined_by(right, incarnations, out);
            }
            Expr::BinaryOp { op: BinaryOp::Eq, left, .. } => {
                if let Expr::Symbol { name } = left.as_ref() {
                    if incarnations.contains(name) {
                        out.push(*name);
                    }
                }
            }
            _ => {}
        }
    }

    /// A straight-line body of assignments and havocs over two variables.
    fn straight_line() -> impl Strategy<Value = Vec<(bool, bool, i64)>> {
        prop::collection::vec((any::<bool>(), any::<bool>(), -5i64..5), 1..12)
    }

    proptest! {
        #[test]
        fn every_incarnation_is_defined_once(steps in straight_line(), branch in any::<bool>()) {
            let mut imp = implementation();
            let cmds: Vec<Cmd> = steps
                .iter()
                .map(|(havoc, on_y, k)| {
                    let var: InternedString = if *on_y { "y".into() } else { "z".into() };
                    if *havoc {
                        Cmd::havoc(vec![var])
                    } else {
                        Cmd::assign(var, Expr::symbol("y").plus(Expr::int_constant(*k)))
                    }
                })
                .collect();
            let entry = imp.add_block("entry", vec![]);
            let left = imp.add_block("left", cmds.clone());
            let right = imp.add_block("right", if branch { cmds } else { vec![] });
            let join = imp.add_block(
                "join",
                vec![Cmd::assert(Expr::symbol("y").ge(Expr::symbol("z")))],
            );
            imp.set_transfer(entry, Transfer::goto(vec![left, right]));
            imp.set_transfer(left, Transfer::goto(vec![join]));
            imp.set_transfer(right, Transfer::goto(vec![join]));

            let passive = passify(imp);
            let imp = &passive.implementation;
            let incarnations: Vec<&Variable> =
                imp.locals.iter().filter(|l| l.is_incarnation()).collect();
            let names: BTreeSet<InternedString> = incarnations.iter().map(|l| l.name).collect();
            prop_assert_eq!(names.len(), incarnations.len());
            prop_assert_eq!(names.len(), passive.incarnation_origins.len());
            for var in &incarnations {
                let VariableKind::Incarnation { original, sequence } = var.kind else {
                    unreachable!()
                };
                prop_assert_eq!(var.name.to_string(), format!("{original}@{sequence}"));
            }
            for id in &passive.order {
                prop_assert!(imp.block(*id).cmds.iter().all(Cmd::is_passive));
            }

            // Along any path each incarnation is defined by at most one
            // equality or havoc, and every incarnation is defined on some path.
            let mut defined_somewhere = BTreeSet::new();
            for path in paths(imp, imp.entry()) {
                let labels: BTreeSet<InternedString> =
                    path.iter().map(|id| imp.block(*id).label).collect();
                let mut definitions: Vec<InternedString> = passive
                    .incarnation_origins
                    .iter()
                    .filter_map(|(name, origin)| match origin {
                        IncarnationOrigin::Havoc { block } if labels.contains(block) => Some(*name),
                        _ => None,
                    })
                    .collect();
                for id in &path {
                    for cmd in &imp.block(*id).cmds {
                        if let Cmd::Assume { condition } = cmd {
                            defined_by(condition, &names, &mut definitions);
                        }
                    }
                }
                let mut counts: BTreeMap<InternedString, usize> = BTreeMap::new();
                for name in definitions {
                    *counts.entry(name).or_default() += 1;
                }
                for (name, count) in counts {
                    prop_assert_eq!(count, 1, "`{}` is defined {} times on one path", name, count);
                    defined_somewhere.insert(name);
                }
            }
            prop_assert_eq!(defined_somewhere, names);
        }
    }
}
