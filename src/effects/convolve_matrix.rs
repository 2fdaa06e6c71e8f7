//! ConvolveMatrix: general 2D convolution with edge handling.
//!
//! The destination splits into an interior, where every tap lands inside the
//! source and needs no edge handling, and up to four border strips that go
//! through the edge-mode path. Interior rows are spread over the worker pool.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::geometry::FloatRect;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// How taps outside the input are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    /// Clamp to the nearest edge pixel.
    #[default]
    Duplicate,
    /// Wrap around to the opposite edge.
    Wrap,
    /// Contribute nothing.
    None,
}

impl EdgeMode {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            EdgeMode::Duplicate => "DUPLICATE",
            EdgeMode::Wrap => "WRAP",
            EdgeMode::None => "NONE",
        }
    }
}

/// ConvolveMatrix parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvolveMatrix {
    /// Kernel columns.
    pub order_x: i32,
    /// Kernel rows.
    pub order_y: i32,
    /// `order_x * order_y` weights, row major.
    pub kernel_matrix: Vec<f32>,
    /// Divisor; the kernel sum (or 1 when that is 0) when absent.
    pub divisor: Option<f32>,
    /// Added after division, in [0, 1] units.
    pub bias: f32,
    /// Kernel column aligned with the output pixel; `order_x / 2` when absent.
    pub target_x: Option<i32>,
    /// Kernel row aligned with the output pixel; `order_y / 2` when absent.
    pub target_y: Option<i32>,
    /// Out-of-range tap handling.
    pub edge_mode: EdgeMode,
    /// Copy alpha through and convolve only color.
    pub preserve_alpha: bool,
}

impl Default for ConvolveMatrix {
    fn default() -> Self {
        Self {
            order_x: 3,
            order_y: 3,
            kernel_matrix: Vec::new(),
            divisor: None,
            bias: 0.0,
            target_x: None,
            target_y: None,
            edge_mode: EdgeMode::Duplicate,
            preserve_alpha: false,
        }
    }
}

impl ConvolveMatrix {
    /// A square kernel with default target, divisor and edge mode.
    pub fn new(order: i32, kernel_matrix: Vec<f32>) -> Self {
        Self {
            order_x: order,
            order_y: order,
            kernel_matrix,
            ..Self::default()
        }
    }

    /// Returns true when the value changed.
    pub fn set_kernel(&mut self, order_x: i32, order_y: i32, kernel_matrix: Vec<f32>) -> bool {
        if self.order_x == order_x && self.order_y == order_y && self.kernel_matrix == kernel_matrix {
            return false;
        }
        self.order_x = order_x;
        self.order_y = order_y;
        self.kernel_matrix = kernel_matrix;
        true
    }

    /// Returns true when the value changed.
    pub fn set_divisor(&mut self, divisor: Option<f32>) -> bool {
        if self.divisor == divisor {
            return false;
        }
        self.divisor = divisor;
        true
    }

    /// Returns true when the value changed.
    pub fn set_bias(&mut self, bias: f32) -> bool {
        if self.bias == bias {
            return false;
        }
        self.bias = bias;
        true
    }

    /// Returns true when the value changed.
    pub fn set_target(&mut self, target_x: Option<i32>, target_y: Option<i32>) -> bool {
        if self.target_x == target_x && self.target_y == target_y {
            return false;
        }
        self.target_x = target_x;
        self.target_y = target_y;
        true
    }

    /// Returns true when the value changed.
    pub fn set_edge_mode(&mut self, edge_mode: EdgeMode) -> bool {
        if self.edge_mode == edge_mode {
            return false;
        }
        self.edge_mode = edge_mode;
        true
    }

    /// Returns true when the value changed.
    pub fn set_preserve_alpha(&mut self, preserve_alpha: bool) -> bool {
        if self.preserve_alpha == preserve_alpha {
            return false;
        }
        self.preserve_alpha = preserve_alpha;
        true
    }

    /// Effective target column.
    pub fn target_x(&self) -> i32 {
        self.target_x.unwrap_or(self.order_x / 2)
    }

    /// Effective target row.
    pub fn target_y(&self) -> i32 {
        self.target_y.unwrap_or(self.order_y / 2)
    }

    /// Effective divisor.
    pub fn effective_divisor(&self) -> f32 {
        if let Some(divisor) = self.divisor {
            return divisor;
        }
        let sum: f32 = self.kernel_matrix.iter().sum();
        if sum == 0.0 {
            1.0
        } else {
            sum
        }
    }

    pub(crate) fn parameter_errors(&self) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        if self.order_x <= 0 || self.order_y <= 0 {
            errors.push((
                "order".to_string(),
                format!("must be positive, got {}x{}", self.order_x, self.order_y),
            ));
            return errors;
        }
        let expected = self.order_x as usize * self.order_y as usize;
        if self.kernel_matrix.len() != expected {
            errors.push((
                "kernelMatrix".to_string(),
                format!("expected {expected} values, got {}", self.kernel_matrix.len()),
            ));
        }
        if !(0..self.order_x).contains(&self.target_x()) {
            errors.push((
                "targetX".to_string(),
                format!("{} is outside [0, {})", self.target_x(), self.order_x),
            ));
        }
        if !(0..self.order_y).contains(&self.target_y()) {
            errors.push((
                "targetY".to_string(),
                format!("{} is outside [0, {})", self.target_y(), self.order_y),
            ));
        }
        if self.divisor == Some(0.0) {
            errors.push(("divisor".to_string(), "must not be zero".to_string()));
        }
        errors
    }

    fn is_valid(&self) -> bool {
        self.parameter_errors().is_empty()
    }

    pub(crate) fn map_paint_rect(&self, mut rect: FloatRect, forward: bool) -> FloatRect {
        if !self.is_valid() {
            return rect;
        }
        let tx = self.target_x() as f32;
        let ty = self.target_y() as f32;
        let ox = self.order_x as f32;
        let oy = self.order_y as f32;
        if forward {
            rect.move_by(tx - ox, ty - oy);
        } else {
            rect.move_by(-tx, -ty);
        }
        rect.expand(ox, oy);
        rect
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        self.convolve(ctx, false)
    }

    /// Run the kernel. `force_border` sends every pixel through the edge-mode path.
    pub(crate) fn convolve(&self, ctx: &ApplyContext<'_>, force_border: bool) -> PixelBuffer {
        let representation = if self.preserve_alpha {
            AlphaRepresentation::Unmultiplied
        } else {
            AlphaRepresentation::Premultiplied
        };
        if !self.is_valid() {
            return ctx.transparent(representation);
        }
        let source = if self.preserve_alpha {
            ctx.input_unmultiplied(0)
        } else {
            ctx.input_premultiplied(0)
        };
        let mut out = PixelBuffer::new(source.width(), source.height(), representation);
        if source.is_empty() {
            return out;
        }

        let ow = self.order_x as usize;
        let oh = self.order_y as usize;
        // Rotate 180 degrees so the inner loop walks source and kernel in step.
        let kernel: Vec<f32> = (0..oh)
            .flat_map(|ky| (0..ow).map(move |kx| (ky, kx)))
            .map(|(ky, kx)| self.kernel_matrix[(oh - 1 - ky) * ow + (ow - 1 - kx)])
            .collect();
        let painter = Convolver {
            src: source.data(),
            width: source.width() as i32,
            height: source.height() as i32,
            kernel: &kernel,
            order_x: self.order_x,
            order_y: self.order_y,
            target_x: self.target_x(),
            target_y: self.target_y(),
            divisor: self.effective_divisor(),
            bias: self.bias * 255.0,
            preserve_alpha: self.preserve_alpha,
            edge_mode: self.edge_mode,
        };

        let width = painter.width;
        let height = painter.height;
        let tx = painter.target_x;
        let ty = painter.target_y;
        let clip_right = width - self.order_x;
        let clip_bottom = height - self.order_y;
        let stride = out.stride();

        if force_border || clip_right < 0 || clip_bottom < 0 {
            painter.paint_border(out.data_mut(), 0, 0, width, height);
            return out;
        }

        let interior_rows = (clip_bottom + 1) as usize;
        let interior_area = interior_rows * (clip_right + 1) as usize;
        let jobs = ctx.parallel.jobs_for(interior_area, ctx.parallel.min_area);
        let first = ty as usize * stride;
        let interior = &mut out.data_mut()[first..first + interior_rows * stride];
        jobs.execute_rows(interior, stride, |first_row, rows| {
            for (i, row) in rows.chunks_exact_mut(stride).enumerate() {
                let y = ty + (first_row + i) as i32;
                for x in tx..=tx + clip_right {
                    let offset = x as usize * 4;
                    painter.paint_interior(&mut row[offset..offset + 4], x, y);
                }
            }
        });

        let clip_right = clip_right + tx + 1;
        let clip_bottom = clip_bottom + ty + 1;
        let data = out.data_mut();
        if ty > 0 {
            painter.paint_border(data, 0, 0, width, ty);
        }
        if clip_bottom < height {
            painter.paint_border(data, 0, clip_bottom, width, height);
        }
        if tx > 0 {
            painter.paint_border(data, 0, ty, tx, clip_bottom);
        }
        if clip_right < width {
            painter.paint_border(data, clip_right, ty, width, clip_bottom);
        }
        out
    }

    pub(crate) fn write_parameters(&self, out: &mut String) -> fmt::Result {
        write!(
            out,
            " order=\"{}x{}\" kernelMatrix=\"{:?}\" divisor=\"{}\" bias=\"{}\" target=\"{}, {}\" edgeMode=\"{}\" preserveAlpha=\"{}\"",
            self.order_x,
            self.order_y,
            self.kernel_matrix,
            self.effective_divisor(),
            self.bias,
            self.target_x(),
            self.target_y(),
            self.edge_mode.name(),
            self.preserve_alpha
        )
    }
}

struct Convolver<'a> {
    src: &'a [u8],
    width: i32,
    height: i32,
    kernel: &'a [f32],
    order_x: i32,
    order_y: i32,
    target_x: i32,
    target_y: i32,
    divisor: f32,
    bias: f32,
    preserve_alpha: bool,
    edge_mode: EdgeMode,
}

/// Clamp to `[0, max]` and truncate.
#[inline]
fn clamp_channel(value: f32, max: u8) -> u8 {
    if value <= 0.0 {
        0
    } else if value >= max as f32 {
        max
    } else {
        value as u8
    }
}

impl Convolver<'_> {
    #[inline]
    fn channels(&self) -> usize {
        if self.preserve_alpha {
            3
        } else {
            4
        }
    }

    #[inline]
    fn store(&self, dst: &mut [u8], totals: &[f32; 4], x: i32, y: i32) {
        let max_alpha = if self.preserve_alpha {
            255
        } else {
            clamp_channel(totals[3] / self.divisor + self.bias, 255)
        };
        for c in 0..3 {
            dst[c] = clamp_channel(totals[c] / self.divisor + self.bias, max_alpha);
        }
        dst[3] = if self.preserve_alpha {
            self.src[((y * self.width + x) * 4 + 3) as usize]
        } else {
            max_alpha
        };
    }

    fn paint_interior(&self, dst: &mut [u8], x: i32, y: i32) {
        let mut totals = [0.0f32; 4];
        let channels = self.channels();
        let mut k = 0;
        for ky in 0..self.order_y {
            let row = ((y - self.target_y + ky) * self.width + (x - self.target_x)) as usize * 4;
            for kx in 0..self.order_x as usize {
                let weight = self.kernel[k];
                k += 1;
                let offset = row + kx * 4;
                for (c, total) in totals.iter_mut().enumerate().take(channels) {
                    *total += weight * self.src[offset + c] as f32;
                }
            }
        }
        self.store(dst, &totals, x, y);
    }

    fn resolve(&self, value: i32, size: i32) -> Option<i32> {
        if (0..size).contains(&value) {
            return Some(value);
        }
        match self.edge_mode {
            EdgeMode::None => None,
            EdgeMode::Duplicate => Some(value.clamp(0, size - 1)),
            EdgeMode::Wrap => Some(value.rem_euclid(size)),
        }
    }

    fn paint_with_edges(&self, dst: &mut [u8], x: i32, y: i32) {
        let mut totals = [0.0f32; 4];
        let channels = self.channels();
        let mut k = 0;
        for ky in 0..self.order_y {
            let sy = self.resolve(y - self.target_y + ky, self.height);
            for kx in 0..self.order_x {
                let weight = self.kernel[k];
                k += 1;
                let (Some(sy), Some(sx)) = (sy, self.resolve(x - self.target_x + kx, self.width)) else {
                    continue;
                };
                let offset = ((sy * self.width + sx) * 4) as usize;
                for (c, total) in totals.iter_mut().enumerate().take(channels) {
                    *total += weight * self.src[offset + c] as f32;
                }
            }
        }
        self.store(dst, &totals, x, y);
    }

    fn paint_border(&self, data: &mut [u8], x1: i32, y1: i32, x2: i32, y2: i32) {
        for y in y1..y2 {
            for x in x1..x2 {
                let offset = ((y * self.width + x) * 4) as usize;
                self.paint_with_edges(&mut data[offset..offset + 4], x, y);
            }
        }
    }
}
