// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic blocks of an implementation, kept in an arena and addressed by index.
//!
//! Blocks refer to each other only through [BlockId]. Predecessor lists are
//! derived data: they are updated by the arena every time a transfer changes,
//! so callers can split, redirect and append blocks freely.

use super::{Cmd, Variable};
use crate::InternedString;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;

/// Index of a block in its implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// How control leaves a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transfer {
    /// Nondeterministic jump to one of the targets
    Goto { targets: Vec<BlockId> },
    /// Leave the implementation
    Return,
}

impl Transfer {
    pub fn goto(targets: Vec<BlockId>) -> Self {
        Transfer::Goto { targets }
    }

    pub fn successors(&self) -> &[BlockId] {
        match self {
            Transfer::Goto { targets } => targets,
            Transfer::Return => &[],
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Transfer::Return)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub label: InternedString,
    pub cmds: Vec<Cmd>,
    predecessors: Vec<BlockId>,
    transfer: Transfer,
}

impl Block {
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    pub fn transfer(&self) -> &Transfer {
        &self.transfer
    }

    pub fn successors(&self) -> &[BlockId] {
        self.transfer.successors()
    }
}

/// Ways a block graph can fail to be a well-formed loop-free body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("implementation has no blocks")]
    Empty,
    #[error("no block returns")]
    NoExit,
    #[error("block `{label}` jumps to {target}, which does not exist")]
    DanglingTarget { label: InternedString, target: BlockId },
    #[error("predecessors of `{label}` disagree with the transfers that reach it")]
    InconsistentPredecessors { label: InternedString },
    #[error("returning block `{label}` is unreachable from the entry")]
    UnreachableReturn { label: InternedString },
    #[error("control flow through `{label}` is cyclic")]
    Cycle { label: InternedString },
}

/// A procedure body: parameters, locals, and a block graph with one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Implementation {
    pub name: InternedString,
    pub in_params: Vec<Variable>,
    pub out_params: Vec<Variable>,
    pub locals: Vec<Variable>,
    pub attributes: Vec<InternedString>,
    blocks: Vec<Block>,
    entry: BlockId,
}

impl Implementation {
    pub fn new(name: InternedString, in_params: Vec<Variable>, out_params: Vec<Variable>) -> Self {
        Implementation {
            name,
            in_params,
            out_params,
            locals: Vec::new(),
            attributes: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| *a == attribute)
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn set_entry(&mut self, entry: BlockId) {
        self.entry = entry;
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + 'static {
        (0..self.blocks.len()).map(BlockId)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Mutable access to a block's label and commands. Edges are edited
    /// through [Implementation::set_transfer].
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn find_block(&self, label: &str) -> Option<BlockId> {
        self.blocks.iter().position(|b| b.label == label).map(BlockId)
    }

    /// Append a block that returns. The first block added is the entry.
    pub fn add_block<T: Into<InternedString>>(&mut self, label: T, cmds: Vec<Cmd>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            label: label.into(),
            cmds,
            predecessors: Vec::new(),
            transfer: Transfer::Return,
        });
        id
    }

    /// `base` if no block carries that label yet, otherwise `base` with the
    /// smallest numeric suffix that makes it unique.
    pub fn fresh_label(&self, base: &str) -> InternedString {
        if self.find_block(base).is_none() {
            return base.into();
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|label| self.find_block(label).is_none())
            .map(InternedString::from)
            .unwrap_or_else(|| base.into())
    }

    /// Replace the transfer of `id`, keeping predecessor lists in sync.
    pub fn set_transfer(&mut self, id: BlockId, transfer: Transfer) {
        let old = std::mem::replace(&mut self.blocks[id.0].transfer, transfer);
        for target in old.successors() {
            if let Some(preds) = self.blocks.get_mut(target.0).map(|b| &mut b.predecessors) {
                if let Some(pos) = preds.iter().position(|p| *p == id) {
                    preds.remove(pos);
                }
            }
        }
        let targets = self.blocks[id.0].transfer.successors().to_vec();
        for target in targets {
            if let Some(block) = self.blocks.get_mut(target.0) {
                block.predecessors.push(id);
            }
        }
    }

    pub fn return_blocks(&self) -> Vec<BlockId> {
        self.block_ids().filter(|id| self.block(*id).transfer.is_return()).collect()
    }

    /// Look up a parameter or local by name.
    pub fn variable(&self, name: InternedString) -> Option<&Variable> {
        self.in_params
            .iter()
            .chain(&self.out_params)
            .chain(&self.locals)
            .find(|v| v.name == name)
    }

    /// Blocks reachable from the entry, in breadth-first order.
    pub fn reachable(&self) -> Vec<BlockId> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.entry]);
        while let Some(id) = queue.pop_front() {
            if id.0 >= self.blocks.len() || !seen.insert(id) {
                continue;
            }
            order.push(id);
            queue.extend(self.block(id).successors().iter().copied());
        }
        order
    }

    /// Check the graph: every target exists, predecessor lists match the
    /// transfers, every returning block is reachable, and there is no cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_order().map(|_| ())
    }

    /// Reachable blocks such that every block comes after all of its reachable
    /// predecessors. Ties are broken by declaration order.
    pub fn topological_order(&self) -> Result<Vec<BlockId>, GraphError> {
        if self.blocks.is_empty() {
            return Err(GraphError::Empty);
        }
        self.check_edges()?;

        let reachable: BTreeSet<BlockId> = self.reachable().into_iter().collect();
        if let Some(id) = self.return_blocks().into_iter().find(|id| !reachable.contains(id)) {
            return Err(GraphError::UnreachableReturn { label: self.block(id).label });
        }

        let mut in_degree = vec![0usize; self.blocks.len()];
        for id in &reachable {
            for succ in self.block(*id).successors() {
                in_degree[succ.0] += 1;
            }
        }
        let mut ready: BTreeSet<BlockId> =
            reachable.iter().copied().filter(|id| in_degree[id.0] == 0).collect();
        let mut order = Vec::with_capacity(reachable.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for succ in self.block(id).successors() {
                in_degree[succ.0] -= 1;
                if in_degree[succ.0] == 0 {
                    ready.insert(*succ);
                }
            }
        }
        if order.len() < reachable.len() {
            let stuck = reachable.iter().find(|id| in_degree[id.0] > 0).copied().unwrap_or(self.entry);
            return Err(GraphError::Cycle { label: self.block(stuck).label });
        }
        Ok(order)
    }

    fn check_edges(&self) -> Result<(), GraphError> {
        let mut expected: Vec<Vec<BlockId>> = vec![Vec::new(); self.blocks.len()];
        for id in self.block_ids() {
            for target in self.block(id).successors() {
                if target.0 >= self.blocks.len() {
                    return Err(GraphError::DanglingTarget {
                        label: self.block(id).label,
                        target: *target,
                    });
                }
                expected[target.0].push(id);
            }
        }
        for (block, mut expected) in self.blocks.iter().zip(expected) {
            let mut actual = block.predecessors.clone();
            actual.sort();
            expected.sort();
            if actual != expected {
                return Err(GraphError::InconsistentPredecessors { label: block.label });
            }
        }
        Ok(())
    }
}
