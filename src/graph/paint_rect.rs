//! Primitive subregions and absolute paint rect propagation.
//!
//! Subregions flow bottom-up: a node's subregion starts from the union of
//! its inputs' subregions. Paint rects flow top-down: the root is asked for
//! a rectangle and each node works out what it needs from its inputs.

use crate::core::error::{GraphResult, NodeId};
use crate::core::geometry::{FloatRect, IntRect};
use crate::effects::EffectKind;
use crate::graph::structure::FilterGraph;

impl FilterGraph {
    // ========================================================================
    // Subregions
    // ========================================================================

    /// Compute the primitive subregion and max effect rect of every node.
    pub fn determine_filter_primitive_subregions(&mut self) {
        for index in 0..self.nodes.len() {
            self.update_primitive_subregion(index);
        }
    }

    /// Compute the primitive subregion of `id` and everything it reads from.
    ///
    /// Returns the subregion in local units.
    pub fn determine_filter_primitive_subregion(&mut self, id: NodeId) -> GraphResult<FloatRect> {
        self.node(id)?;
        let mut chain = self.upstream(id);
        chain.sort();
        chain.push(id);
        for node in chain {
            self.update_primitive_subregion(node.index());
        }
        Ok(self.nodes[id.index()].primitive_subregion)
    }

    fn update_primitive_subregion(&mut self, index: usize) {
        let filter = self.filter;
        let node = &self.nodes[index];

        let mut subregion = if node.inputs.is_empty() || matches!(node.kind, EffectKind::Tile) {
            filter.region
        } else {
            let mut united = FloatRect::default();
            for input in &node.inputs {
                united.unite(&self.nodes[input.index()].primitive_subregion);
            }
            let absolute = filter.map_local_rect_to_absolute(&united);
            filter.map_absolute_rect_to_local(&node.kind.map_paint_rect(absolute, true, &filter))
        };

        let boundaries = node.effect_boundaries;
        if node.has_x {
            subregion.x = boundaries.x;
        }
        if node.has_y {
            subregion.y = boundaries.y;
        }
        if node.has_width {
            subregion.width = boundaries.width;
        }
        if node.has_height {
            subregion.height = boundaries.height;
        }

        let mut max_effect_rect = filter.map_local_rect_to_absolute(&subregion);
        max_effect_rect.intersect(&filter.absolute_region());

        let node = &mut self.nodes[index];
        node.primitive_subregion = subregion;
        if node.max_effect_rect != max_effect_rect {
            node.max_effect_rect = max_effect_rect;
            node.clear_result();
        }
    }

    // ========================================================================
    // Paint Rects
    // ========================================================================

    /// Grow the absolute paint rects of `id` and its inputs so that `id` can
    /// produce `requested`.
    ///
    /// Returns the part of `requested` the node actually paints.
    pub fn determine_absolute_paint_rect(&mut self, id: NodeId, requested: FloatRect) -> GraphResult<FloatRect> {
        self.node(id)?;
        Ok(self.paint_rect_for(id.index(), requested))
    }

    fn paint_rect_for(&mut self, index: usize, requested: FloatRect) -> FloatRect {
        let node = &self.nodes[index];
        let mut requested = requested;
        if node.clips_to_bounds {
            requested.intersect(&node.max_effect_rect);
        }
        if node.kind.is_source() {
            if let Some(source) = &self.source {
                requested.intersect(&FloatRect::from(source.rect()));
            }
        }
        if node.absolute_paint_rect.contains(&IntRect::enclosing(&requested)) {
            return requested;
        }

        let inputs = node.inputs.clone();
        let painted = match &node.kind {
            EffectKind::Composite(composite) if inputs.len() == 2 => {
                let composite = *composite;
                let b = self.paint_rect_for(inputs[1].index(), requested);
                let a_request = if composite.clips_first_input_to_second() {
                    b
                } else {
                    requested
                };
                let a = self.paint_rect_for(inputs[0].index(), a_request);
                composite
                    .combine_input_rects(a, b, requested)
                    .intersection(&requested)
            }
            _ => {
                let affects_transparent_pixels = node.kind.affects_transparent_pixels();
                let input_rect = self.map_node_rect(index, requested, false);
                let mut united = FloatRect::default();
                for input in &inputs {
                    united.unite(&self.paint_rect_for(input.index(), input_rect));
                }
                let united = self.map_node_rect(index, united, true);
                if affects_transparent_pixels || inputs.is_empty() {
                    requested
                } else {
                    united.intersection(&requested)
                }
            }
        };

        self.nodes[index].add_absolute_paint_rect(NodeId(index), &painted);
        painted
    }

    /// A node's rect mapping. Tile maps to rectangles of the graph rather
    /// than of its parameters.
    fn map_node_rect(&self, index: usize, rect: FloatRect, forward: bool) -> FloatRect {
        let node = &self.nodes[index];
        match node.kind {
            EffectKind::Tile if forward => node.max_effect_rect,
            EffectKind::Tile => node
                .inputs
                .first()
                .map(|input| self.nodes[input.index()].max_effect_rect)
                .unwrap_or(rect),
            _ => node.kind.map_paint_rect(rect, forward, &self.filter),
        }
    }
}
