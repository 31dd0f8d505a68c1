// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graph normalisation: a single returning block, and empty blocks on the
//! edges from branching blocks into join points.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use vc_ast::{BlockId, GraphError, Implementation, Transfer};

pub(crate) const UNIFIED_EXIT_LABEL: &str = "GeneratedUnifiedExit";

/// Make sure exactly one block returns. When several do, a new empty block
/// labelled `GeneratedUnifiedExit` becomes the only exit and every former
/// returning block jumps to it. The replaced transfers are returned, keyed by
/// the block they belonged to.
pub(crate) fn unify_exits(
    implementation: &mut Implementation,
) -> Result<(BlockId, BTreeMap<BlockId, Transfer>), GraphError> {
    let returns = implementation.return_blocks();
    match returns.as_slice() {
        [] => Err(GraphError::NoExit),
        [single] => Ok((*single, BTreeMap::new())),
        _ => {
            let label = implementation.fresh_label(UNIFIED_EXIT_LABEL);
            let exit = implementation.add_block(label, Vec::new());
            let mut origins = BTreeMap::new();
            for id in returns {
                origins.insert(id, implementation.block(id).transfer().clone());
                implementation.set_transfer(id, Transfer::goto(vec![exit]));
            }
            debug!(implementation = %implementation.name, returns = origins.len(), "unified exits");
            Ok((exit, origins))
        }
    }
}

/// Put an empty block on every edge that leaves a block with several
/// successors and enters a block with several predecessors. Returns the number
/// of blocks added.
pub(crate) fn split_critical_edges(implementation: &mut Implementation) -> usize {
    let mut added = 0;
    let joins: Vec<BlockId> = implementation
        .block_ids()
        .filter(|id| implementation.block(*id).predecessors().len() > 1)
        .collect();
    for join in joins {
        let preds: BTreeSet<BlockId> =
            implementation.block(join).predecessors().iter().copied().collect();
        for pred in preds {
            if implementation.block(pred).successors().len() < 2 {
                continue;
            }
            let base = format!(
                "{}_@2_{}",
                implementation.block(pred).label,
                implementation.block(join).label
            );
            let label = implementation.fresh_label(&base);
            let between = implementation.add_block(label, Vec::new());
            implementation.set_transfer(between, Transfer::goto(vec![join]));
            let targets = implementation
                .block(pred)
                .successors()
                .iter()
                .map(|t| if *t == join { between } else { *t })
                .collect();
            implementation.set_transfer(pred, Transfer::goto(targets));
            added += 1;
        }
    }
    added
}
