//! DropShadow: a blurred, offset, recolored copy of the input under the input.

use super::flood::color_in_space;
use super::gaussian_blur::{self, blur, inflate_for_blur, kernel_sizes};
use super::ApplyContext;
use crate::core::buffer::{div255, AlphaRepresentation, PixelBuffer};
use crate::core::draw::{draw, draw_with_opacity, CompositeOperator};
use crate::core::geometry::{Color, FloatRect};
use crate::core::region::FilterRegion;
use serde::{Deserialize, Serialize};

/// DropShadow parameters, lengths in local units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropShadow {
    /// Horizontal blur deviation.
    pub std_deviation_x: f32,
    /// Vertical blur deviation.
    pub std_deviation_y: f32,
    /// Horizontal shadow offset.
    pub dx: f32,
    /// Vertical shadow offset.
    pub dy: f32,
    /// Device RGB shadow color.
    pub shadow_color: Color,
    /// Multiplies the shadow's alpha.
    pub shadow_opacity: f32,
}

impl Default for DropShadow {
    fn default() -> Self {
        Self {
            std_deviation_x: 2.0,
            std_deviation_y: 2.0,
            dx: 2.0,
            dy: 2.0,
            shadow_color: Color::BLACK,
            shadow_opacity: 1.0,
        }
    }
}

impl DropShadow {
    /// A black, fully opaque shadow.
    pub fn new(std_deviation_x: f32, std_deviation_y: f32, dx: f32, dy: f32) -> Self {
        Self {
            std_deviation_x,
            std_deviation_y,
            dx,
            dy,
            ..Self::default()
        }
    }

    /// Returns true when the value changed.
    pub fn set_std_deviation(&mut self, x: f32, y: f32) -> bool {
        if self.std_deviation_x == x && self.std_deviation_y == y {
            return false;
        }
        self.std_deviation_x = x;
        self.std_deviation_y = y;
        true
    }

    /// Returns true when the value changed.
    pub fn set_offset(&mut self, dx: f32, dy: f32) -> bool {
        if self.dx == dx && self.dy == dy {
            return false;
        }
        self.dx = dx;
        self.dy = dy;
        true
    }

    /// Returns true when the value changed.
    pub fn set_shadow_color(&mut self, color: Color) -> bool {
        if self.shadow_color == color {
            return false;
        }
        self.shadow_color = color;
        true
    }

    /// Returns true when the value changed.
    pub fn set_shadow_opacity(&mut self, opacity: f32) -> bool {
        if self.shadow_opacity == opacity {
            return false;
        }
        self.shadow_opacity = opacity;
        true
    }

    pub(crate) fn parameter_errors(&self) -> Vec<(String, String)> {
        gaussian_blur::deviation_errors(self.std_deviation_x, self.std_deviation_y)
    }

    pub(crate) fn map_paint_rect(&self, rect: FloatRect, forward: bool, filter: &FilterRegion) -> FloatRect {
        let dx = filter.apply_horizontal_scale(self.dx);
        let dy = filter.apply_vertical_scale(self.dy);
        let mut shadow = rect;
        if forward {
            shadow.move_by(dx, dy);
        } else {
            shadow.move_by(-dx, -dy);
        }
        let (kx, ky) = kernel_sizes(filter, self.std_deviation_x, self.std_deviation_y);
        inflate_for_blur(&mut shadow, kx, ky);
        rect.union(&shadow)
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let input = ctx.input_premultiplied(0);
        let dx = ctx.filter.apply_horizontal_scale(self.dx).round() as i32;
        let dy = ctx.filter.apply_vertical_scale(self.dy).round() as i32;

        let mut out = ctx.transparent(AlphaRepresentation::Premultiplied);
        if let Some(source) = ctx.inputs.first() {
            let (x, y) = source.offset_in(&ctx.paint_rect);
            draw_with_opacity(&mut out, &source.image.as_premultiplied(), x + dx, y + dy, self.shadow_opacity);
        }

        let (kx, ky) = kernel_sizes(ctx.filter, self.std_deviation_x, self.std_deviation_y);
        blur(&mut out, kx, ky, true, ctx.parallel);

        let color = color_in_space(self.shadow_color, ctx.operating_color_space).premultiplied();
        for pixel in out.data_mut().chunks_exact_mut(4) {
            let alpha = pixel[3] as u32;
            for (channel, &c) in pixel.iter_mut().zip(&color) {
                *channel = div255(c as u32 * alpha) as u8;
            }
        }

        draw(&mut out, &input, 0, 0, CompositeOperator::SourceOver);
        out
    }
}
