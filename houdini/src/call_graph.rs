// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Who calls whom, and the order in which summaries should be computed.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::BTreeMap;
use vc_ast::{InternedString, Program};

/// Calls between implementations. Edges go from caller to callee; calls to
/// procedures without an implementation are left out.
pub(crate) struct CallGraph {
    graph: DiGraph<InternedString, ()>,
    nodes: BTreeMap<InternedString, NodeIndex>,
    /// Height of each node's strongly connected component in the condensed
    /// graph. Components that call nothing else have priority 0.
    priorities: Vec<usize>,
}

impl CallGraph {
    pub(crate) fn new(program: &Program) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        for implementation in &program.implementations {
            nodes.entry(implementation.name).or_insert_with(|| graph.add_node(implementation.name));
        }
        for implementation in &program.implementations {
            let caller = nodes[&implementation.name];
            let mut callees = Vec::new();
            for cmd in implementation.blocks().iter().flat_map(|b| &b.cmds) {
                cmd.callees(&mut callees);
            }
            for callee in callees {
                if let Some(callee) = nodes.get(&callee) {
                    graph.update_edge(caller, *callee, ());
                }
            }
        }

        // `tarjan_scc` lists components callees first.
        let mut priorities = vec![0; graph.node_count()];
        for component in tarjan_scc(&graph) {
            let height = component
                .iter()
                .flat_map(|n| graph.neighbors_directed(*n, Direction::Outgoing))
                .filter(|callee| !component.contains(callee))
                .map(|callee| priorities[callee.index()] + 1)
                .max()
                .unwrap_or(0);
            for node in &component {
                priorities[node.index()] = height;
            }
        }
        CallGraph { graph, nodes, priorities }
    }

    /// Implementations are processed in increasing priority order.
    pub(crate) fn priority(&self, name: InternedString) -> usize {
        self.nodes.get(&name).map_or(0, |n| self.priorities[n.index()])
    }

    /// Direct callers of `name`, in declaration order.
    pub(crate) fn callers(&self, name: InternedString) -> Vec<InternedString> {
        let Some(node) = self.nodes.get(&name) else { return Vec::new() };
        let mut callers: Vec<NodeIndex> =
            self.graph.neighbors_directed(*node, Direction::Incoming).collect();
        callers.sort();
        callers.into_iter().map(|n| self.graph[n]).collect()
    }
}
