//! A single node of the filter graph.

use crate::core::buffer::PixelBuffer;
use crate::core::color_space::{convert_unmultiplied, ColorSpace};
use crate::core::error::NodeId;
use crate::core::geometry::{FloatRect, IntRect};
use crate::effects::EffectKind;
use crate::execution::cache::ImageFilterCache;
use log::trace;
use std::borrow::Cow;

/// One effect in a [`FilterGraph`](crate::graph::FilterGraph).
///
/// Besides its parameters a node keeps the geometry computed by the paint
/// rect propagator and at most one result, valid for `absolute_paint_rect`.
#[derive(Debug)]
pub struct FilterEffectNode {
    pub(crate) kind: EffectKind,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) operating_color_space: ColorSpace,
    pub(crate) result_color_space: ColorSpace,
    pub(crate) absolute_paint_rect: IntRect,
    pub(crate) max_effect_rect: FloatRect,
    pub(crate) primitive_subregion: FloatRect,
    pub(crate) effect_boundaries: FloatRect,
    pub(crate) has_x: bool,
    pub(crate) has_y: bool,
    pub(crate) has_width: bool,
    pub(crate) has_height: bool,
    pub(crate) clips_to_bounds: bool,
    pub(crate) result: Option<PixelBuffer>,
    pub(crate) image_filters: ImageFilterCache,
}

impl FilterEffectNode {
    pub(crate) fn new(kind: EffectKind, inputs: Vec<NodeId>) -> Self {
        let operating_color_space = kind.default_operating_color_space();
        Self {
            kind,
            inputs,
            operating_color_space,
            result_color_space: ColorSpace::DeviceRgb,
            absolute_paint_rect: IntRect::default(),
            max_effect_rect: FloatRect::default(),
            primitive_subregion: FloatRect::default(),
            effect_boundaries: FloatRect::default(),
            has_x: false,
            has_y: false,
            has_width: false,
            has_height: false,
            clips_to_bounds: true,
            result: None,
            image_filters: ImageFilterCache::new(),
        }
    }

    /// The effect and its parameters.
    pub fn kind(&self) -> &EffectKind {
        &self.kind
    }

    /// Input node ids, in input order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Color space the kernel runs in.
    pub fn operating_color_space(&self) -> ColorSpace {
        self.operating_color_space
    }

    /// Color space of the cached result.
    pub fn result_color_space(&self) -> ColorSpace {
        self.result_color_space
    }

    /// Absolute rectangle the cached (or next) result covers.
    pub fn absolute_paint_rect(&self) -> IntRect {
        self.absolute_paint_rect
    }

    /// Absolute primitive subregion clipped to the filter region.
    pub fn max_effect_rect(&self) -> FloatRect {
        self.max_effect_rect
    }

    /// Primitive subregion in local units.
    pub fn primitive_subregion(&self) -> FloatRect {
        self.primitive_subregion
    }

    /// Explicit subregion values, meaningful where the matching `has_*` flag is set.
    pub fn effect_boundaries(&self) -> FloatRect {
        self.effect_boundaries
    }

    /// Which of x, y, width and height are explicit.
    pub fn explicit_boundaries(&self) -> [bool; 4] {
        [self.has_x, self.has_y, self.has_width, self.has_height]
    }

    /// Whether requests are clipped to `max_effect_rect`.
    pub fn clips_to_bounds(&self) -> bool {
        self.clips_to_bounds
    }

    /// True for SourceAlpha, whose color channels carry nothing.
    pub fn is_alpha_image(&self) -> bool {
        matches!(self.kind, EffectKind::SourceAlpha)
    }

    /// True when a result is cached.
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// The cached result as stored.
    pub fn result(&self) -> Option<&PixelBuffer> {
        self.result.as_ref()
    }

    /// The cached result, premultiplied.
    pub fn premultiplied_result(&self) -> Option<Cow<'_, PixelBuffer>> {
        self.result.as_ref().map(PixelBuffer::as_premultiplied)
    }

    /// The cached result, unmultiplied.
    pub fn unmultiplied_result(&self) -> Option<Cow<'_, PixelBuffer>> {
        self.result.as_ref().map(PixelBuffer::as_unmultiplied)
    }

    /// Accelerated filter handles built for this node.
    pub fn image_filters(&self) -> &ImageFilterCache {
        &self.image_filters
    }

    pub(crate) fn set_result(&mut self, result: PixelBuffer, color_space: ColorSpace) {
        self.result = Some(result);
        self.result_color_space = color_space;
    }

    /// Drop the result, the paint rect and every accelerated handle.
    pub(crate) fn clear_result(&mut self) {
        self.result = None;
        self.absolute_paint_rect = IntRect::default();
        self.image_filters.clear();
    }

    /// Grow the paint rect to cover `rect`. Growing discards the result so
    /// it is never partially recomputed.
    pub(crate) fn add_absolute_paint_rect(&mut self, id: NodeId, rect: &FloatRect) {
        let rect = IntRect::enclosing(rect);
        if rect.is_empty() || self.absolute_paint_rect.contains(&rect) {
            return;
        }
        let grown = rect.union(&self.absolute_paint_rect);
        trace!("node {id} paint rect {} -> {grown}", self.absolute_paint_rect);
        self.clear_result();
        self.absolute_paint_rect = grown;
    }

    /// Convert the cached result to `dst` in place.
    ///
    /// Alpha images are left alone since only their alpha channel matters.
    pub(crate) fn transform_result_color_space(&mut self, dst: ColorSpace) {
        if self.is_alpha_image() || self.result_color_space == dst {
            return;
        }
        let Some(result) = self.result.take() else {
            return;
        };
        let mut result = result.into_unmultiplied();
        convert_unmultiplied(result.data_mut(), self.result_color_space, dst);
        self.result = Some(result);
        self.result_color_space = dst;
    }
}
