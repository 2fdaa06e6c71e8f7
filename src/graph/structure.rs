//! Graph structure and node management.
//!
//! The FilterGraph owns every node in a flat arena. Nodes refer to their
//! inputs by [`NodeId`], and an input must already exist when a node is
//! added, so arena order is always a valid evaluation order and cycles
//! cannot be expressed.

use crate::core::color_space::ColorSpace;
use crate::core::error::{GraphError, GraphResult, NodeId};
use crate::core::geometry::FloatRect;
use crate::core::region::FilterRegion;
use crate::effects::{EffectKind, SourceImage};
use crate::graph::node::FilterEffectNode;
use log::trace;
use std::collections::{HashSet, VecDeque};

/// A filter: an arena of effects, the effect that produces the output, the
/// filter region and the bound source image.
#[derive(Debug, Default)]
pub struct FilterGraph {
    pub(crate) nodes: Vec<FilterEffectNode>,
    pub(crate) last_effect: Option<NodeId>,
    pub(crate) filter: FilterRegion,
    pub(crate) source: Option<SourceImage>,
}

impl FilterGraph {
    /// Create an empty graph over `filter`.
    pub fn new(filter: FilterRegion) -> Self {
        Self {
            nodes: Vec::new(),
            last_effect: None,
            filter,
            source: None,
        }
    }

    /// The filter region and scale.
    pub fn filter_region(&self) -> &FilterRegion {
        &self.filter
    }

    /// Replace the filter region. Every cached result is dropped.
    pub fn set_filter_region(&mut self, filter: FilterRegion) {
        if self.filter == filter {
            return;
        }
        self.filter = filter;
        self.clear_all_results();
    }

    // ========================================================================
    // Node Management
    // ========================================================================

    /// Add an effect reading from `inputs`, which must already be in the graph.
    ///
    /// The input count is not checked here; validation and evaluation report
    /// a mismatch with the kind's arity.
    pub fn add_effect(&mut self, kind: EffectKind, inputs: Vec<NodeId>) -> GraphResult<NodeId> {
        if let Some(missing) = inputs.iter().find(|input| input.index() >= self.nodes.len()) {
            return Err(GraphError::NodeNotFound(*missing));
        }
        let id = NodeId(self.nodes.len());
        trace!("adding {} as {id} with inputs {inputs:?}", kind.name());
        self.nodes.push(FilterEffectNode::new(kind, inputs));
        Ok(id)
    }

    /// Mark the effect whose result is the filter's output.
    pub fn set_last_effect(&mut self, id: NodeId) -> GraphResult<()> {
        self.node(id)?;
        self.last_effect = Some(id);
        Ok(())
    }

    /// The effect whose result is the filter's output.
    pub fn last_effect(&self) -> Option<NodeId> {
        self.last_effect
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> GraphResult<&FilterEffectNode> {
        self.nodes.get(id.index()).ok_or(GraphError::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut FilterEffectNode> {
        self.nodes.get_mut(id.index()).ok_or(GraphError::NodeNotFound(id))
    }

    /// The parameters of a node.
    pub fn effect(&self, id: NodeId) -> GraphResult<&EffectKind> {
        self.node(id).map(FilterEffectNode::kind)
    }

    /// Iterate over all nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FilterEffectNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Get all node IDs.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ========================================================================
    // Parameter Updates
    // ========================================================================

    /// Run a parameter setter on a node.
    ///
    /// `update` returns whether anything changed, the way the per-kind
    /// setters do. A change clears the node and all of its dependents.
    pub fn update_effect<F>(&mut self, id: NodeId, update: F) -> GraphResult<bool>
    where
        F: FnOnce(&mut EffectKind) -> bool,
    {
        let changed = update(&mut self.node_mut(id)?.kind);
        if changed {
            self.clear_results_recursive(id)?;
        }
        Ok(changed)
    }

    /// Set the color space a node's kernel runs in.
    pub fn set_operating_color_space(&mut self, id: NodeId, color_space: ColorSpace) -> GraphResult<bool> {
        let node = self.node_mut(id)?;
        if node.operating_color_space == color_space {
            return Ok(false);
        }
        node.operating_color_space = color_space;
        self.clear_results_recursive(id)?;
        Ok(true)
    }

    /// Give a node explicit subregion components, in local units.
    ///
    /// `None` leaves that component to input propagation.
    pub fn set_effect_boundaries(
        &mut self,
        id: NodeId,
        x: Option<f32>,
        y: Option<f32>,
        width: Option<f32>,
        height: Option<f32>,
    ) -> GraphResult<()> {
        let node = self.node_mut(id)?;
        node.has_x = x.is_some();
        node.has_y = y.is_some();
        node.has_width = width.is_some();
        node.has_height = height.is_some();
        node.effect_boundaries = FloatRect::new(
            x.unwrap_or_default(),
            y.unwrap_or_default(),
            width.unwrap_or_default(),
            height.unwrap_or_default(),
        );
        self.clear_results_recursive(id)
    }

    /// Whether requests for a node are clipped to its max effect rect.
    pub fn set_clips_to_bounds(&mut self, id: NodeId, clips: bool) -> GraphResult<()> {
        let node = self.node_mut(id)?;
        if node.clips_to_bounds != clips {
            node.clips_to_bounds = clips;
            self.clear_results_recursive(id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Source Image
    // ========================================================================

    /// Bind the image SourceGraphic and SourceAlpha read. Every cached result
    /// is dropped.
    pub fn set_source_image(&mut self, source: SourceImage) {
        let image = source.image.into_premultiplied();
        self.source = Some(SourceImage::new(image, source.origin));
        self.clear_all_results();
    }

    /// The bound source image, premultiplied.
    pub fn source_image(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    /// Unbind the source image.
    pub fn clear_source_image(&mut self) {
        if self.source.take().is_some() {
            self.clear_all_results();
        }
    }

    // ========================================================================
    // Graph Queries
    // ========================================================================

    /// Nodes that read `id`'s result, directly or transitively, in arena order.
    pub fn dependents(&self, id: NodeId) -> Vec<NodeId> {
        let mut affected = HashSet::new();
        affected.insert(id);
        let mut result = Vec::new();
        for (index, node) in self.nodes.iter().enumerate().skip(id.index() + 1) {
            if node.inputs.iter().any(|input| affected.contains(input)) {
                affected.insert(NodeId(index));
                result.push(NodeId(index));
            }
        }
        result
    }

    /// Nodes `id` reads from, directly or transitively.
    pub fn upstream(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(current.index()) else {
                continue;
            };
            for &input in &node.inputs {
                if visited.insert(input) {
                    result.push(input);
                    queue.push_back(input);
                }
            }
        }

        result
    }

    /// True when `target` feeds into `start`, or they are the same node.
    pub fn is_reachable(&self, start: NodeId, target: NodeId) -> bool {
        start == target || self.upstream(start).contains(&target)
    }

    /// Source leaves `id` reads from, itself included.
    pub fn reads_source(&self, id: NodeId) -> bool {
        let is_source = |n: NodeId| self.nodes.get(n.index()).is_some_and(|node| node.kind.is_source());
        is_source(id) || self.upstream(id).into_iter().any(is_source)
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Drop the results of `id` and of everything that depends on it.
    pub fn clear_results_recursive(&mut self, id: NodeId) -> GraphResult<()> {
        self.node_mut(id)?.clear_result();
        let dependents = self.dependents(id);
        trace!("cleared {id} and {} dependent(s)", dependents.len());
        for dependent in dependents {
            self.nodes[dependent.index()].clear_result();
        }
        Ok(())
    }

    /// Drop every node's result.
    pub fn clear_all_results(&mut self) {
        for node in &mut self.nodes {
            node.clear_result();
        }
    }
}
