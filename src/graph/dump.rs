//! Text dump of a graph for diagnostics and tests.

use crate::core::error::{GraphResult, NodeId};
use crate::graph::structure::FilterGraph;

const INDENT: &str = "  ";

impl FilterGraph {
    /// Render `id` and its inputs as an indented tree.
    ///
    /// Each node is one `[feKind param="value" ...]` line; its inputs follow
    /// one level deeper, in input order.
    pub fn external_representation(&self, id: NodeId) -> GraphResult<String> {
        self.node(id)?;
        let mut out = String::new();
        self.write_node(&mut out, id, 0);
        Ok(out)
    }

    fn write_node(&self, out: &mut String, id: NodeId, depth: usize) {
        let Some(node) = self.nodes.get(id.index()) else {
            return;
        };
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        out.push('[');
        out.push_str(node.kind.name());
        node.kind.write_parameters(out);
        out.push_str("]\n");
        for &input in &node.inputs {
            self.write_node(out, input, depth + 1);
        }
    }
}
