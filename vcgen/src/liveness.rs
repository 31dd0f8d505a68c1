// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backwards live-variable analysis over a loop-free block graph.

use std::collections::{BTreeMap, BTreeSet};
use vc_ast::{BlockId, Cmd, Expr, Implementation, InternedString, Variable};

pub(crate) struct Liveness {
    live_in: BTreeMap<BlockId, BTreeSet<InternedString>>,
}

impl Liveness {
    /// `order` must list every reachable block after its predecessors.
    pub(crate) fn compute(
        implementation: &Implementation,
        order: &[BlockId],
        declarations: &BTreeMap<InternedString, Variable>,
    ) -> Self {
        let mut live_in: BTreeMap<BlockId, BTreeSet<InternedString>> = BTreeMap::new();
        for id in order.iter().rev() {
            let block = implementation.block(*id);
            let mut live: BTreeSet<InternedString> = block
                .successors()
                .iter()
                .filter_map(|s| live_in.get(s))
                .flatten()
                .copied()
                .collect();
            for cmd in block.cmds.iter().rev() {
                transfer(cmd, &mut live, declarations);
            }
            live_in.insert(*id, live);
        }
        Liveness { live_in }
    }

    pub(crate) fn is_live(&self, block: BlockId, var: InternedString) -> bool {
        self.live_in.get(&block).is_some_and(|live| live.contains(&var))
    }
}

fn read(e: &Expr, live: &mut BTreeSet<InternedString>) {
    live.extend(e.free_symbols());
    live.extend(e.old_symbols());
}

fn where_clause_reads(
    vars: impl Iterator<Item = InternedString>,
    live: &mut BTreeSet<InternedString>,
    declarations: &BTreeMap<InternedString, Variable>,
) {
    for var in vars {
        if let Some(w) = declarations.get(&var).and_then(|d| d.where_clause.as_ref()) {
            read(w, live);
        }
    }
}

fn transfer(
    cmd: &Cmd,
    live: &mut BTreeSet<InternedString>,
    declarations: &BTreeMap<InternedString, Variable>,
) {
    match cmd {
        Cmd::Assert(a) => read(&a.condition, live),
        Cmd::Assume { condition } => read(condition, live),
        Cmd::Assign { pairs } => {
            for (lhs, _) in pairs {
                live.remove(lhs);
            }
            for (_, rhs) in pairs {
                read(rhs, live);
            }
        }
        Cmd::Havoc { vars } => {
            where_clause_reads(vars.iter().copied(), live, declarations);
            for var in vars {
                live.remove(var);
            }
        }
        Cmd::Call { arguments, outputs, .. } => {
            for output in outputs {
                live.remove(output);
            }
            for argument in arguments {
                read(argument, live);
            }
        }
        Cmd::Comment(_) => {}
        Cmd::Scope { locals, cmds } => {
            for cmd in cmds.iter().rev() {
                transfer(cmd, live, declarations);
            }
            where_clause_reads(locals.iter().map(|l| l.name), live, declarations);
            for local in locals {
                live.remove(&local.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc_ast::{Transfer, Type};

    #[test]
    fn assignment_kills_and_reads() {
        // entry: y := x; goto next   next: assert y > 0
        let mut imp = Implementation::new("P".into(), vec![], vec![]);
        let entry = imp.add_block("entry", vec![Cmd::assign("y".into(), Expr::symbol("x"))]);
        let next = imp.add_block("next", vec![Cmd::assert(Expr::symbol("y").gt(Expr::int_constant(0)))]);
        imp.set_transfer(entry, Transfer::goto(vec![next]));
        let order = imp.topological_order().unwrap();
        let liveness = Liveness::compute(&imp, &order, &BTreeMap::new());

        assert!(liveness.is_live(next, "y".into()));
        assert!(!liveness.is_live(entry, "y".into()));
        assert!(liveness.is_live(entry, "x".into()));
    }

    #[test]
    fn havoc_reads_other_variables_of_the_where_clause() {
        let z = Variable::local("z".into(), Type::Int)
            .with_where_clause(Expr::symbol("z").lt(Expr::symbol("bound")));
        let declarations = BTreeMap::from([(z.name, z)]);
        let mut imp = Implementation::new("P".into(), vec![], vec![]);
        let entry = imp.add_block("entry", vec![Cmd::havoc(vec!["z".into()])]);
        let order = imp.topological_order().unwrap();
        let liveness = Liveness::compute(&imp, &order, &declarations);

        assert!(liveness.is_live(entry, "bound".into()));
        assert!(!liveness.is_live(entry, "z".into()));
    }

    #[test]
    fn old_reads_count_as_uses() {
        let mut imp = Implementation::new("P".into(), vec![], vec![]);
        let entry = imp.add_block(
            "entry",
            vec![Cmd::assert(Expr::symbol("h").old().eq(Expr::int_constant(0)))],
        );
        let order = imp.topological_order().unwrap();
        let liveness = Liveness::compute(&imp, &order, &BTreeMap::new());
        assert!(liveness.is_live(entry, "h".into()));
    }
}
