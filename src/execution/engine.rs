//! Evaluation engine implementation.
//!
//! The engine evaluates a filter graph for a requested region: it propagates
//! paint rects top-down, then runs the reachable kernels bottom-up in
//! topological order, converting color spaces between nodes.

use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::color_space::ColorSpace;
use crate::core::error::{EffectError, EffectGraphError, EffectGraphResult, GraphError, NodeId};
use crate::core::geometry::{FloatRect, IntRect};
use crate::core::parallel::ParallelSettings;
use crate::effects::{ApplyContext, EffectInput};
use crate::graph::structure::FilterGraph;
use crate::graph::topology::TopologyAnalyzer;
use crate::validation::ValidationPipeline;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Largest paint area a node may have before it fails with a size error.
pub const DEFAULT_MAX_FILTER_AREA: u64 = 4096 * 4096;

/// Evaluation options.
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Largest absolute paint area (pixels) any node may produce.
    pub max_filter_area: u64,
    /// Whether kernels may split work across the worker pool.
    pub parallel: bool,
    /// Minimum area per job for blur, lighting, convolution and turbulence.
    pub parallel_min_area: usize,
    /// Minimum area per job for morphology.
    pub morphology_min_area: usize,
    /// Maximum jobs per kernel (0 = pool size).
    pub max_jobs: usize,
    /// Whether to run the validation pipeline before evaluating.
    pub validate_parameters: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        let parallel = ParallelSettings::default();
        Self {
            max_filter_area: DEFAULT_MAX_FILTER_AREA,
            parallel: parallel.enabled,
            parallel_min_area: parallel.min_area,
            morphology_min_area: parallel.morphology_min_area,
            max_jobs: parallel.max_jobs,
            validate_parameters: true,
        }
    }
}

impl EvaluationOptions {
    /// Create a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum paint area per node.
    pub fn with_max_filter_area(mut self, area: u64) -> Self {
        self.max_filter_area = area;
        self
    }

    /// Enable/disable parallel kernels.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the per-job area threshold for most kernels.
    pub fn with_parallel_min_area(mut self, area: usize) -> Self {
        self.parallel_min_area = area;
        self
    }

    /// Set the per-job area threshold for morphology.
    pub fn with_morphology_min_area(mut self, area: usize) -> Self {
        self.morphology_min_area = area;
        self
    }

    /// Set maximum jobs per kernel.
    pub fn with_max_jobs(mut self, jobs: usize) -> Self {
        self.max_jobs = jobs;
        self
    }

    /// Enable/disable the validation pipeline.
    pub fn with_validate_parameters(mut self, validate: bool) -> Self {
        self.validate_parameters = validate;
        self
    }

    /// The split policy handed to kernels.
    pub fn parallel_settings(&self) -> ParallelSettings {
        ParallelSettings {
            enabled: self.parallel,
            min_area: self.parallel_min_area,
            morphology_min_area: self.morphology_min_area,
            max_jobs: self.max_jobs,
        }
    }
}

/// Result of evaluating a graph.
#[derive(Debug)]
pub struct EvaluationResult {
    /// The root's result in device RGB, premultiplied. `None` when the root failed.
    pub image: Option<PixelBuffer>,
    /// Absolute rectangle `image` covers.
    pub paint_rect: IntRect,
    /// Evaluation statistics.
    pub stats: EvaluationStats,
    /// Per-node failures, in evaluation order.
    pub errors: Vec<EffectError>,
}

impl EvaluationResult {
    /// True when the root produced an image.
    pub fn is_success(&self) -> bool {
        self.image.is_some()
    }

    /// Failures that did not just come from a failed input.
    pub fn origin_errors(&self) -> impl Iterator<Item = &EffectError> {
        self.errors.iter().filter(|e| e.is_origin())
    }
}

/// Evaluation statistics.
#[derive(Debug, Clone, Default)]
pub struct EvaluationStats {
    /// Total evaluation time.
    pub total_duration: Duration,
    /// Number of kernels run.
    pub nodes_evaluated: usize,
    /// Number of nodes whose cached result was still valid.
    pub nodes_reused: usize,
    /// Number of nodes that produced no result.
    pub nodes_failed: usize,
    /// Pixels written by the kernels that ran.
    pub pixels_produced: u64,
}

enum NodeOutcome {
    Reused,
    Evaluated { pixels: u64 },
}

/// The evaluation engine.
#[derive(Debug, Clone, Default)]
pub struct EvaluationEngine {
    options: EvaluationOptions,
}

impl EvaluationEngine {
    /// Create an engine with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with `options`.
    pub fn with_options(options: EvaluationOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Evaluate the root over its whole max effect rect.
    pub fn evaluate(&self, graph: &mut FilterGraph) -> EffectGraphResult<EvaluationResult> {
        self.evaluate_request(graph, None)
    }

    /// Evaluate the root over `region` (absolute).
    pub fn evaluate_region(
        &self,
        graph: &mut FilterGraph,
        region: FloatRect,
    ) -> EffectGraphResult<EvaluationResult> {
        self.evaluate_request(graph, Some(region))
    }

    fn evaluate_request(
        &self,
        graph: &mut FilterGraph,
        region: Option<FloatRect>,
    ) -> EffectGraphResult<EvaluationResult> {
        let start = Instant::now();
        let root = graph.last_effect().ok_or(GraphError::NoRootEffect)?;

        if self.options.validate_parameters {
            let report = ValidationPipeline::default_pipeline().validate(graph);
            for warning in &report.warnings {
                debug!("{}", warning.message);
            }
            if let Some(error) = report.errors.into_iter().next() {
                return Err(EffectGraphError::Validation(error));
            }
        }

        let order = TopologyAnalyzer::new(graph).evaluation_order(root)?;
        for &id in &order {
            let node = graph.node(id)?;
            let got = node.inputs().len();
            let arity = node.kind().input_arity();
            if !arity.accepts(got) {
                return Err(GraphError::InputArity {
                    kind: node.kind().name().to_string(),
                    expected: arity.expected(got),
                    got,
                }
                .into());
            }
        }

        graph.determine_filter_primitive_subregions();
        let requested = match region {
            Some(region) => region,
            None => graph.node(root)?.max_effect_rect(),
        };
        graph.determine_absolute_paint_rect(root, requested)?;

        let parallel = self.options.parallel_settings();
        let mut stats = EvaluationStats::default();
        let mut errors = Vec::new();
        for &id in &order {
            match self.evaluate_node(graph, id, &parallel) {
                Ok(NodeOutcome::Reused) => stats.nodes_reused += 1,
                Ok(NodeOutcome::Evaluated { pixels }) => {
                    stats.nodes_evaluated += 1;
                    stats.pixels_produced += pixels;
                }
                Err(error) => {
                    warn!("{error}");
                    stats.nodes_failed += 1;
                    errors.push(error);
                }
            }
        }

        let node = graph.node_mut(root)?;
        node.transform_result_color_space(ColorSpace::DeviceRgb);
        let image = node.result().map(|result| result.clone().into_premultiplied());
        let paint_rect = node.absolute_paint_rect();

        stats.total_duration = start.elapsed();
        info!(
            "evaluated {} of {} nodes ({} reused, {} failed) in {:?}",
            stats.nodes_evaluated,
            order.len(),
            stats.nodes_reused,
            stats.nodes_failed,
            stats.total_duration
        );

        Ok(EvaluationResult {
            image,
            paint_rect,
            stats,
            errors,
        })
    }

    /// Produce one node's result, assuming its inputs were handled first.
    fn evaluate_node(
        &self,
        graph: &mut FilterGraph,
        id: NodeId,
        parallel: &ParallelSettings,
    ) -> Result<NodeOutcome, EffectError> {
        let (earlier, rest) = graph.nodes.split_at_mut(id.index());
        let Some(node) = rest.first_mut() else {
            return Err(EffectError::InvalidParameters {
                node_id: id,
                reason: "node is not in the graph".to_string(),
            });
        };
        if node.has_result() {
            return Ok(NodeOutcome::Reused);
        }

        if let Some(&input) = node
            .inputs
            .iter()
            .find(|input| earlier.get(input.index()).map_or(true, |n| !n.has_result()))
        {
            return Err(EffectError::MissingInput { node_id: id, input });
        }

        let problems = node.kind.parameter_errors();
        if !problems.is_empty() {
            let reason = problems
                .iter()
                .map(|(parameter, reason)| format!("{parameter} {reason}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(EffectError::InvalidParameters { node_id: id, reason });
        }

        let paint_rect = node.absolute_paint_rect;
        if paint_rect.area() > self.options.max_filter_area {
            return Err(EffectError::SizeExceeded {
                node_id: id,
                width: paint_rect.width,
                height: paint_rect.height,
                max_area: self.options.max_filter_area,
            });
        }

        if node.kind.is_source() && graph.source.is_none() {
            return Err(EffectError::MissingSourceImage(id));
        }

        let color_space = node.operating_color_space;
        if paint_rect.is_empty() {
            node.set_result(
                PixelBuffer::for_rect(&paint_rect, AlphaRepresentation::Premultiplied),
                color_space,
            );
            return Ok(NodeOutcome::Evaluated { pixels: 0 });
        }

        let needs_valid = node.kind.requires_valid_premultiplied_pixels();
        let mut inputs = Vec::with_capacity(node.inputs.len());
        for (slot, &input_id) in node.inputs.iter().enumerate() {
            let input = &mut earlier[input_id.index()];
            if node.kind.transforms_input_color_space(slot) {
                input.transform_result_color_space(color_space);
            }
            let Some(result) = input.result.as_ref() else {
                return Err(EffectError::MissingInput { node_id: id, input: input_id });
            };
            let mut image = result.clone();
            if needs_valid && input.kind.may_produce_invalid_premultiplied_pixels() {
                image = image.into_premultiplied();
                image.force_valid_premultiplied();
            }
            inputs.push(EffectInput {
                image,
                paint_rect: input.absolute_paint_rect,
                max_effect_rect: input.max_effect_rect,
                is_source: input.kind.is_source(),
            });
        }

        let start = Instant::now();
        let result = {
            let ctx = ApplyContext {
                paint_rect,
                max_effect_rect: node.max_effect_rect,
                primitive_subregion: node.primitive_subregion,
                filter: &graph.filter,
                operating_color_space: color_space,
                is_alpha_image: node.is_alpha_image(),
                parallel,
                inputs: &inputs,
                source: graph.source.as_ref(),
            };
            node.kind.apply(&ctx)
        };
        debug!(
            "{id} {} painted {paint_rect} in {:?}",
            node.kind.name(),
            start.elapsed()
        );
        node.set_result(result, color_space);
        Ok(NodeOutcome::Evaluated {
            pixels: paint_rect.area(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ValidationError;
    use crate::core::geometry::{Color, IntPoint};
    use crate::core::region::FilterRegion;
    use crate::effects::testing::noise;
    use crate::effects::{EffectKind, Flood, GaussianBlur, Offset, SourceImage};

    const RED: Color = Color {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };

    fn region(width: f32, height: f32) -> FilterRegion {
        FilterRegion::new(FloatRect::new(0.0, 0.0, width, height))
    }

    /// Red flood shifted by `(dx, dy)` inside an 8x8 filter region.
    fn shifted_flood(dx: f32, dy: f32) -> (FilterGraph, NodeId, NodeId) {
        let mut graph = FilterGraph::new(region(8.0, 8.0));
        let flood = graph
            .add_effect(EffectKind::Flood(Flood::new(RED, 1.0)), vec![])
            .unwrap();
        let offset = graph
            .add_effect(EffectKind::Offset(Offset::new(dx, dy)), vec![flood])
            .unwrap();
        graph.set_last_effect(offset).unwrap();
        (graph, flood, offset)
    }

    #[test]
    fn test_options_builder() {
        let options = EvaluationOptions::new()
            .with_parallel(false)
            .with_max_jobs(3)
            .with_parallel_min_area(10)
            .with_morphology_min_area(20)
            .with_max_filter_area(99)
            .with_validate_parameters(false);
        let settings = options.parallel_settings();
        assert!(!settings.enabled);
        assert_eq!(settings.max_jobs, 3);
        assert_eq!(settings.min_area, 10);
        assert_eq!(settings.morphology_min_area, 20);
        assert_eq!(options.max_filter_area, 99);
        assert_eq!(EvaluationOptions::default().max_filter_area, 4096 * 4096);
    }

    #[test]
    fn test_offset_flood_end_to_end() {
        let (mut graph, flood, _) = shifted_flood(2.0, 3.0);
        let result = EvaluationEngine::new().evaluate(&mut graph).unwrap();

        assert!(result.errors.is_empty());
        assert_eq!(result.paint_rect, IntRect::new(2, 3, 6, 5));
        let image = result.image.unwrap();
        assert_eq!((image.width(), image.height()), (6, 5));
        assert!(image.data().chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
        assert_eq!(
            graph.node(flood).unwrap().absolute_paint_rect(),
            IntRect::new(0, 0, 6, 5)
        );
        assert_eq!(result.stats.nodes_evaluated, 2);
        assert_eq!(result.stats.pixels_produced, 60);
    }

    #[test]
    fn test_results_are_reused() {
        let (mut graph, _, offset) = shifted_flood(2.0, 3.0);
        let engine = EvaluationEngine::new();
        engine.evaluate(&mut graph).unwrap();

        let second = engine.evaluate(&mut graph).unwrap();
        assert_eq!(second.stats.nodes_reused, 2);
        assert_eq!(second.stats.nodes_evaluated, 0);
        assert!(second.image.is_some());

        // The flood's existing rect still covers what the new offset needs.
        graph
            .update_effect(offset, |kind| match kind {
                EffectKind::Offset(o) => o.set_dx(3.0) | o.set_dy(4.0),
                _ => false,
            })
            .unwrap();
        let third = engine.evaluate(&mut graph).unwrap();
        assert_eq!(third.stats.nodes_reused, 1);
        assert_eq!(third.stats.nodes_evaluated, 1);
        assert_eq!(third.paint_rect, IntRect::new(3, 4, 5, 4));
    }

    #[test]
    fn test_size_error_reaches_root() {
        let (mut graph, flood, offset) = shifted_flood(2.0, 3.0);
        let engine = EvaluationEngine::with_options(EvaluationOptions::new().with_max_filter_area(16));
        let result = engine.evaluate(&mut graph).unwrap();

        assert!(!result.is_success());
        assert_eq!(result.stats.nodes_failed, 2);
        assert_eq!(
            result.errors,
            vec![
                EffectError::SizeExceeded {
                    node_id: flood,
                    width: 6,
                    height: 5,
                    max_area: 16,
                },
                EffectError::MissingInput {
                    node_id: offset,
                    input: flood,
                },
            ]
        );
        assert_eq!(result.origin_errors().count(), 1);
        assert!(!graph.node(offset).unwrap().has_result());
    }

    #[test]
    fn test_bad_parameters_never_reach_kernel() {
        let (mut graph, _, offset) = shifted_flood(0.0, 0.0);
        let blur = graph
            .add_effect(EffectKind::GaussianBlur(GaussianBlur::new(-1.0, 2.0)), vec![offset])
            .unwrap();
        graph.set_last_effect(blur).unwrap();

        let err = EvaluationEngine::new().evaluate(&mut graph).unwrap_err();
        assert!(matches!(
            err,
            EffectGraphError::Validation(ValidationError::InvalidParameter { node_id, .. }) if node_id == blur
        ));

        let engine = EvaluationEngine::with_options(EvaluationOptions::new().with_validate_parameters(false));
        let result = engine.evaluate(&mut graph).unwrap();
        assert!(result.image.is_none());
        assert!(matches!(
            result.errors.as_slice(),
            [EffectError::InvalidParameters { node_id, .. }] if *node_id == blur
        ));
    }

    #[test]
    fn test_missing_source() {
        let mut graph = FilterGraph::new(region(4.0, 4.0));
        let source = graph.add_effect(EffectKind::SourceGraphic, vec![]).unwrap();
        let offset = graph
            .add_effect(EffectKind::Offset(Offset::new(1.0, 0.0)), vec![source])
            .unwrap();
        graph.set_last_effect(offset).unwrap();

        let err = EvaluationEngine::new().evaluate(&mut graph).unwrap_err();
        assert!(matches!(
            err,
            EffectGraphError::Validation(ValidationError::MissingSourceImage(_))
        ));

        let engine = EvaluationEngine::with_options(EvaluationOptions::new().with_validate_parameters(false));
        let result = engine.evaluate(&mut graph).unwrap();
        assert_eq!(result.errors[0], EffectError::MissingSourceImage(source));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_device_rgb_chain_is_exact() {
        let mut graph = FilterGraph::new(region(4.0, 4.0));
        let pixels = noise(4, 4, 7);
        graph.set_source_image(SourceImage::new(pixels.clone(), IntPoint::default()));
        let source = graph.add_effect(EffectKind::SourceGraphic, vec![]).unwrap();
        let offset = graph
            .add_effect(EffectKind::Offset(Offset::new(1.0, 0.0)), vec![source])
            .unwrap();
        graph
            .set_operating_color_space(offset, ColorSpace::DeviceRgb)
            .unwrap();
        graph.set_last_effect(offset).unwrap();

        let result = EvaluationEngine::new().evaluate(&mut graph).unwrap();
        assert_eq!(result.paint_rect, IntRect::new(1, 0, 3, 4));
        let image = result.image.unwrap();
        for y in 0..4 {
            for x in 0..3 {
                assert_eq!(image.pixel(x, y), pixels.pixel(x, y));
            }
        }
    }

    #[test]
    fn test_root_converted_to_device_rgb() {
        let (mut graph, flood, offset) = shifted_flood(0.0, 0.0);
        graph
            .update_effect(flood, |kind| match kind {
                EffectKind::Flood(f) => f.set_flood_color(Color::rgba(0, 0, 255, 255)),
                _ => false,
            })
            .unwrap();
        let result = EvaluationEngine::new().evaluate(&mut graph).unwrap();

        assert_eq!(
            graph.node(offset).unwrap().result_color_space(),
            ColorSpace::DeviceRgb
        );
        assert_eq!(graph.node(flood).unwrap().result_color_space(), ColorSpace::LinearRgb);
        assert_eq!(result.image.unwrap().pixel(0, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn test_region_request_and_errors() {
        let (mut graph, _, _) = shifted_flood(0.0, 0.0);
        let result = EvaluationEngine::new()
            .evaluate_region(&mut graph, FloatRect::new(2.0, 2.0, 3.0, 3.0))
            .unwrap();
        assert_eq!(result.paint_rect, IntRect::new(2, 2, 3, 3));

        let mut empty = FilterGraph::new(region(4.0, 4.0));
        assert!(matches!(
            EvaluationEngine::new().evaluate(&mut empty),
            Err(EffectGraphError::Graph(GraphError::NoRootEffect))
        ));

        let mut lonely = FilterGraph::new(region(4.0, 4.0));
        let flood = lonely
            .add_effect(EffectKind::Flood(Flood::default()), vec![])
            .unwrap();
        let merge = lonely.add_effect(EffectKind::Merge, vec![flood]).unwrap();
        let blend = lonely
            .add_effect(EffectKind::Blend(Default::default()), vec![merge])
            .unwrap();
        lonely.set_last_effect(blend).unwrap();
        let engine = EvaluationEngine::with_options(EvaluationOptions::new().with_validate_parameters(false));
        assert!(matches!(
            engine.evaluate(&mut lonely),
            Err(EffectGraphError::Graph(GraphError::InputArity { got: 1, .. }))
        ));
    }
}
