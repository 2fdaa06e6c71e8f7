//! Offset: translate the input by whole pixels.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::draw::{draw, CompositeOperator};
use crate::core::geometry::FloatRect;
use crate::core::region::FilterRegion;
use serde::{Deserialize, Serialize};

/// Offset parameters, in local units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Offset {
    /// Horizontal shift.
    pub dx: f32,
    /// Vertical shift.
    pub dy: f32,
}

impl Offset {
    /// Shift by `(dx, dy)`.
    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    /// Returns true when the value changed.
    pub fn set_dx(&mut self, dx: f32) -> bool {
        if self.dx == dx {
            return false;
        }
        self.dx = dx;
        true
    }

    /// Returns true when the value changed.
    pub fn set_dy(&mut self, dy: f32) -> bool {
        if self.dy == dy {
            return false;
        }
        self.dy = dy;
        true
    }

    pub(crate) fn map_paint_rect(&self, mut rect: FloatRect, forward: bool, filter: &FilterRegion) -> FloatRect {
        let dx = filter.apply_horizontal_scale(self.dx);
        let dy = filter.apply_vertical_scale(self.dy);
        if forward {
            rect.move_by(dx, dy);
        } else {
            rect.move_by(-dx, -dy);
        }
        rect
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let dx = ctx.filter.apply_horizontal_scale(self.dx).round() as i32;
        let dy = ctx.filter.apply_vertical_scale(self.dy).round() as i32;
        let mut out = ctx.transparent(AlphaRepresentation::Premultiplied);
        let Some(input) = ctx.inputs.first() else {
            return out;
        };
        // Shifted pixels come from the input's own rect, which may lie outside ours.
        let (x, y) = input.offset_in(&ctx.paint_rect);
        draw(&mut out, &input.image.as_premultiplied(), x + dx, y + dy, CompositeOperator::Copy);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color_space::ColorSpace;
    use crate::core::geometry::IntRect;
    use crate::core::parallel::ParallelSettings;
    use crate::effects::EffectInput;

    #[test]
    fn test_map_paint_rect_scales() {
        let filter = FilterRegion::default().with_scale(2.0, 1.0);
        let offset = Offset::new(3.0, -1.0);
        let rect = FloatRect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(
            offset.map_paint_rect(rect, true, &filter),
            FloatRect::new(6.0, -1.0, 10.0, 10.0)
        );
        assert_eq!(
            offset.map_paint_rect(rect, false, &filter),
            FloatRect::new(-6.0, 1.0, 10.0, 10.0)
        );
    }

    #[test]
    fn test_apply_shifts_pixels() {
        let rect = IntRect::new(0, 0, 4, 4);
        let mut image = PixelBuffer::new(4, 4, AlphaRepresentation::Premultiplied);
        image.set_pixel(0, 0, [255, 0, 0, 255]);
        let inputs = [EffectInput {
            image,
            paint_rect: rect,
            max_effect_rect: FloatRect::from(rect),
            is_source: false,
        }];
        let filter = FilterRegion::default();
        let parallel = ParallelSettings::serial();
        let ctx = ApplyContext {
            paint_rect: rect,
            max_effect_rect: FloatRect::from(rect),
            primitive_subregion: FloatRect::from(rect),
            filter: &filter,
            operating_color_space: ColorSpace::LinearRgb,
            is_alpha_image: false,
            parallel: &parallel,
            inputs: &inputs,
            source: None,
        };
        let out = Offset::new(1.4, 2.6).apply(&ctx);
        assert_eq!(out.pixel(1, 3), [255, 0, 0, 255]);
        assert_eq!(out.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_apply_reads_outside_own_rect() {
        use crate::effects::testing::{solid, Harness};
        let input_rect = IntRect::new(0, 0, 2, 2);
        let harness = Harness::new().input(
            input_rect,
            solid(input_rect, [0, 255, 0, 255], AlphaRepresentation::Premultiplied),
        );
        let out = harness.run(
            &crate::effects::EffectKind::Offset(Offset::new(2.0, 3.0)),
            IntRect::new(2, 3, 2, 2),
        );
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(out.pixel(x, y), [0, 255, 0, 255]);
            }
        }
    }
}
