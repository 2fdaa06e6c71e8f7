//! Topological analysis of filter graphs.
//!
//! Provides algorithms for:
//! - Evaluation order of the nodes a root depends on
//! - Depth of a node below its leaves
//! - Nodes that never contribute to the output

use crate::core::error::{GraphError, GraphResult, NodeId};
use crate::graph::structure::FilterGraph;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed, Walker};
use petgraph::Direction;
use std::collections::BTreeSet;

/// Analyzer for graph topology.
///
/// Edges run from an input to the node that reads it, so sources come first.
pub struct TopologyAnalyzer<'a> {
    graph: &'a FilterGraph,
    edges: DiGraph<NodeId, ()>,
}

impl<'a> TopologyAnalyzer<'a> {
    /// Create a new analyzer for the given graph.
    pub fn new(graph: &'a FilterGraph) -> Self {
        let count = graph.node_count();
        let mut edges = DiGraph::with_capacity(count, count);
        for id in graph.node_ids() {
            edges.add_node(id);
        }
        for (id, node) in graph.nodes() {
            // add_effect rejects inputs outside the arena
            for input in node.inputs().iter().filter(|input| input.index() < count) {
                edges.add_edge(NodeIndex::new(input.index()), NodeIndex::new(id.index()), ());
            }
        }
        Self { graph, edges }
    }

    /// Topological order of every node, inputs first.
    pub fn topological_sort(&self) -> GraphResult<Vec<NodeId>> {
        toposort(&self.edges, None)
            .map(|order| order.into_iter().map(|index| self.edges[index]).collect())
            .map_err(|cycle| GraphError::CycleDetected(self.edges[cycle.node_id()]))
    }

    /// Inputs-first order of `root` and everything it reads from.
    pub fn evaluation_order(&self, root: NodeId) -> GraphResult<Vec<NodeId>> {
        let members = self.reaching(root)?;
        Ok(self
            .topological_sort()?
            .into_iter()
            .filter(|id| members.contains(id))
            .collect())
    }

    /// `root` plus every node whose result flows into it.
    fn reaching(&self, root: NodeId) -> GraphResult<BTreeSet<NodeId>> {
        self.graph.node(root)?;
        let reversed = Reversed(&self.edges);
        Ok(Dfs::new(reversed, NodeIndex::new(root.index()))
            .iter(reversed)
            .map(|index| self.edges[index])
            .collect())
    }

    /// Length of the longest input chain below a node.
    ///
    /// Depth 0 = leaves (no inputs)
    pub fn node_depth(&self, id: NodeId) -> GraphResult<usize> {
        let mut depth = vec![0usize; self.graph.node_count()];
        for node in self.evaluation_order(id)? {
            let index = NodeIndex::new(node.index());
            depth[node.index()] = self
                .edges
                .neighbors_directed(index, Direction::Incoming)
                .map(|input| depth[input.index()] + 1)
                .max()
                .unwrap_or(0);
        }
        Ok(depth[id.index()])
    }

    /// Nodes whose results never reach the last effect.
    pub fn unreachable_nodes(&self) -> GraphResult<Vec<NodeId>> {
        let root = self.graph.last_effect().ok_or(GraphError::NoRootEffect)?;
        let reaching = self.reaching(root)?;
        Ok(self
            .graph
            .node_ids()
            .filter(|id| !reaching.contains(id))
            .collect())
    }
}
