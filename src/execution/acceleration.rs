//! Hook for turning nodes into accelerated filter objects.
//!
//! The crate does not generate backend filters itself. A backend implements
//! [`ImageFilterBuilder`], and [`FilterGraph::create_image_filter`] memoizes
//! what it builds per node.

use crate::core::color_space::ColorSpace;
use crate::core::error::{GraphResult, NodeId};
use crate::execution::cache::ImageFilterHandle;
use crate::graph::structure::FilterGraph;
use log::trace;

/// Builds a backend filter object for one node.
pub trait ImageFilterBuilder {
    /// Build `id`'s filter working in `color_space`.
    ///
    /// Implementations read parameters with [`FilterGraph::effect`] and get
    /// their inputs' handles through [`FilterGraph::create_image_filter`].
    /// `None` means the node cannot be accelerated.
    fn build(
        &self,
        graph: &FilterGraph,
        id: NodeId,
        color_space: ColorSpace,
        requires_valid_premultiplied: bool,
    ) -> Option<ImageFilterHandle>;
}

impl FilterGraph {
    /// The accelerated filter for `id`, built on the first request for each
    /// (color space, validity) pair and cached on the node afterwards.
    pub fn create_image_filter<B>(
        &self,
        id: NodeId,
        builder: &B,
        color_space: ColorSpace,
        requires_valid_premultiplied: bool,
    ) -> GraphResult<Option<ImageFilterHandle>>
    where
        B: ImageFilterBuilder + ?Sized,
    {
        let node = self.node(id)?;
        if let Some(handle) = node.image_filters.get(color_space, requires_valid_premultiplied) {
            return Ok(Some(handle));
        }

        // The lock is released while building; builders recurse into inputs.
        let handle = builder.build(self, id, color_space, requires_valid_premultiplied);
        if let Some(handle) = &handle {
            trace!("built image filter for {id} in {}", color_space.name());
            node.image_filters
                .put(color_space, requires_valid_premultiplied, handle.clone());
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::region::FilterRegion;
    use crate::effects::{EffectKind, GaussianBlur};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Describes each node as a string and counts builds.
    #[derive(Default)]
    struct Describe {
        builds: AtomicUsize,
    }

    impl ImageFilterBuilder for Describe {
        fn build(
            &self,
            graph: &FilterGraph,
            id: NodeId,
            color_space: ColorSpace,
            requires_valid_premultiplied: bool,
        ) -> Option<ImageFilterHandle> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let node = graph.node(id).ok()?;
            let mut description = node.kind().name().to_string();
            for &input in node.inputs() {
                let handle = graph
                    .create_image_filter(input, self, color_space, requires_valid_premultiplied)
                    .ok()??;
                let inner = handle.downcast_ref::<String>()?;
                description = format!("{description}({inner})");
            }
            Some(Arc::new(description))
        }
    }

    fn blur_graph() -> (FilterGraph, NodeId) {
        let mut graph = FilterGraph::new(FilterRegion::default());
        let source = graph.add_effect(EffectKind::SourceGraphic, vec![]).unwrap();
        let blur = graph
            .add_effect(EffectKind::GaussianBlur(GaussianBlur::new(1.0, 1.0)), vec![source])
            .unwrap();
        (graph, blur)
    }

    #[test]
    fn test_builder_recurses_and_caches() {
        let (graph, blur) = blur_graph();
        let builder = Describe::default();

        let handle = graph
            .create_image_filter(blur, &builder, ColorSpace::LinearRgb, true)
            .unwrap()
            .unwrap();
        assert_eq!(
            handle.downcast_ref::<String>().map(String::as_str),
            Some("feGaussianBlur(SourceGraphic)")
        );
        assert_eq!(builder.builds.load(Ordering::SeqCst), 2);

        graph
            .create_image_filter(blur, &builder, ColorSpace::LinearRgb, true)
            .unwrap();
        assert_eq!(builder.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_at_most_four_handles_per_node() {
        let (graph, blur) = blur_graph();
        let builder = Describe::default();
        for _ in 0..3 {
            for space in [ColorSpace::DeviceRgb, ColorSpace::LinearRgb] {
                for valid in [false, true] {
                    graph.create_image_filter(blur, &builder, space, valid).unwrap();
                }
            }
        }
        let cache = graph.node(blur).unwrap().image_filters();
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.stats().misses, 4);
        assert_eq!(cache.stats().hits, 8);
    }

    #[test]
    fn test_invalidation_drops_handles() {
        let (mut graph, blur) = blur_graph();
        let builder = Describe::default();
        graph
            .create_image_filter(blur, &builder, ColorSpace::DeviceRgb, false)
            .unwrap();
        graph
            .update_effect(blur, |kind| match kind {
                EffectKind::GaussianBlur(b) => b.set_std_deviation(3.0, 3.0),
                _ => false,
            })
            .unwrap();
        assert!(graph.node(blur).unwrap().image_filters().is_empty());
        assert!(graph
            .create_image_filter(NodeId(9), &builder, ColorSpace::DeviceRgb, false)
            .is_err());
    }
}
