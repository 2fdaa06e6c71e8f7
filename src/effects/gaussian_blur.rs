//! GaussianBlur: three box blur passes per axis.
//!
//! Three successive box filters of width `d` approximate a Gaussian to within
//! a few percent. Even widths alternate the window to the right of, to the
//! left of and around the pixel so the result stays centered.

use super::ApplyContext;
use crate::core::buffer::PixelBuffer;
use crate::core::geometry::FloatRect;
use crate::core::parallel::ParallelSettings;
use crate::core::region::FilterRegion;
use serde::{Deserialize, Serialize};

/// Box widths never exceed this.
pub const MAX_KERNEL_SIZE: u32 = 1000;

/// `3/4·√(2π)`
const KERNEL_FACTOR: f32 = 0.75 * 2.506_628_3;

/// GaussianBlur parameters, deviations in local units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianBlur {
    /// Horizontal standard deviation.
    pub std_deviation_x: f32,
    /// Vertical standard deviation.
    pub std_deviation_y: f32,
}

/// Box width for one (already scaled) deviation. Zero skips the axis.
pub fn kernel_size(std_deviation: f32) -> u32 {
    if !(std_deviation > 0.0) {
        return 0;
    }
    let size = (std_deviation * KERNEL_FACTOR + 0.5).floor();
    if size >= MAX_KERNEL_SIZE as f32 {
        return MAX_KERNEL_SIZE;
    }
    (size as u32).max(2)
}

/// Box widths for both axes after scaling.
pub fn kernel_sizes(filter: &FilterRegion, std_x: f32, std_y: f32) -> (u32, u32) {
    (
        kernel_size(filter.apply_horizontal_scale(std_x)),
        kernel_size(filter.apply_vertical_scale(std_y)),
    )
}

/// Grow `rect` by the reach of a three pass blur.
pub fn inflate_for_blur(rect: &mut FloatRect, kernel_x: u32, kernel_y: u32) {
    rect.inflate_x(3.0 * kernel_x as f32 * 0.5);
    rect.inflate_y(3.0 * kernel_y as f32 * 0.5);
}

impl GaussianBlur {
    /// Blur with the given deviations.
    pub fn new(std_deviation_x: f32, std_deviation_y: f32) -> Self {
        Self {
            std_deviation_x,
            std_deviation_y,
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

    pub(crate) fn parameter_errors(&self) -> Vec<(String, String)> {
        deviation_errors(self.std_deviation_x, self.std_deviation_y)
    }

    pub(crate) fn map_paint_rect(&self, mut rect: FloatRect, filter: &FilterRegion) -> FloatRect {
        let (kx, ky) = kernel_sizes(filter, self.std_deviation_x, self.std_deviation_y);
        inflate_for_blur(&mut rect, kx, ky);
        rect
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let mut out = ctx.input_premultiplied(0);
        let (kx, ky) = kernel_sizes(ctx.filter, self.std_deviation_x, self.std_deviation_y);
        blur(&mut out, kx, ky, ctx.is_alpha_image, ctx.parallel);
        out
    }
}

pub(crate) fn deviation_errors(x: f32, y: f32) -> Vec<(String, String)> {
    let mut errors = Vec::new();
    for (name, value) in [("stdDeviationX", x), ("stdDeviationY", y)] {
        if value.is_nan() || value < 0.0 {
            errors.push((name.to_string(), format!("must be non-negative, got {value}")));
        }
    }
    errors
}

/// Window `(left, right)` and width for pass `pass` of a box of width `size`.
fn kernel_position(pass: usize, size: &mut u32, left: &mut u32, right: &mut u32) {
    let even = *size % 2 == 0;
    match pass {
        0 => {
            *left = if even { *size / 2 - 1 } else { *size / 2 };
            *right = *size - *left;
        }
        1 if even => {
            *left += 1;
            *right -= 1;
        }
        2 if even => {
            *right += 1;
            *size += 1;
        }
        _ => {}
    }
}

/// One moving-sum pass. `step` is the byte distance between neighbours along
/// the blurred axis and `line` the distance between lines.
#[allow(clippy::too_many_arguments)]
fn box_blur(
    src: &[u8],
    dst: &mut [u8],
    size: u32,
    left: u32,
    right: u32,
    step: usize,
    line: usize,
    length: usize,
    lines: usize,
    alpha_only: bool,
) {
    let size = size as usize;
    let left = left as usize;
    let right = right as usize;
    for l in 0..lines {
        let base = l * line;
        for channel in (0..4).rev() {
            let mut sum: usize = 0;
            for i in 0..right.min(length) {
                sum += src[base + i * step + channel] as usize;
            }
            for x in 0..length {
                let offset = base + x * step + channel;
                dst[offset] = (sum / size) as u8;
                if x >= left {
                    sum -= src[offset - left * step] as usize;
                }
                if x + right < length {
                    sum += src[offset + right * step] as usize;
                }
            }
            if alpha_only {
                break;
            }
        }
    }
}

fn blur_serial(data: &mut [u8], width: usize, height: usize, kernel_x: u32, kernel_y: u32, alpha_only: bool) {
    let stride = width * 4;
    let mut scratch = data.to_vec();
    let mut result_in_data = true;
    let (mut kx, mut ky) = (kernel_x, kernel_y);
    let (mut x_left, mut x_right, mut y_left, mut y_right) = (0, 0, 0, 0);
    for pass in 0..3 {
        if kx > 0 {
            kernel_position(pass, &mut kx, &mut x_left, &mut x_right);
            if result_in_data {
                box_blur(data, &mut scratch, kx, x_left, x_right, 4, stride, width, height, alpha_only);
            } else {
                box_blur(&scratch, data, kx, x_left, x_right, 4, stride, width, height, alpha_only);
            }
            result_in_data = !result_in_data;
        }
        if ky > 0 {
            kernel_position(pass, &mut ky, &mut y_left, &mut y_right);
            if result_in_data {
                box_blur(data, &mut scratch, ky, y_left, y_right, stride, 4, height, width, alpha_only);
            } else {
                box_blur(&scratch, data, ky, y_left, y_right, stride, 4, height, width, alpha_only);
            }
            result_in_data = !result_in_data;
        }
    }
    if !result_in_data {
        data.copy_from_slice(&scratch);
    }
}

struct Band {
    start_row: usize,
    /// First row of this band's own output, relative to `start_row`.
    skip: usize,
    rows: usize,
    data: Vec<u8>,
}

/// Blur a premultiplied buffer in place. Alpha-only buffers blur just alpha.
pub fn blur(
    buffer: &mut PixelBuffer,
    kernel_x: u32,
    kernel_y: u32,
    alpha_only: bool,
    parallel: &ParallelSettings,
) {
    if buffer.is_empty() || (kernel_x == 0 && kernel_y == 0) {
        return;
    }
    let width = buffer.width();
    let height = buffer.height();
    let stride = buffer.stride();

    // Rows a band must read past its own output so vertical passes see the
    // same neighbourhood as a whole-buffer run.
    let extra = (3 * kernel_y / 2 + 4) as usize;
    let jobs = parallel.jobs_for(width * height, parallel.min_area + extra * width);
    let job_count = jobs.number_of_jobs().min(height);
    if job_count < 2 {
        blur_serial(buffer.data_mut(), width, height, kernel_x, kernel_y, alpha_only);
        return;
    }

    let block = height / job_count;
    let with_extra = height % job_count;
    let data = buffer.data();
    let mut bands = Vec::with_capacity(job_count);
    let mut current: usize = 0;
    for job in 0..job_count {
        let rows = if job < with_extra { block + 1 } else { block };
        let start = current.saturating_sub(extra);
        let end = (current + rows + extra).min(height);
        bands.push(Band {
            start_row: start,
            skip: current - start,
            rows,
            data: data[start * stride..end * stride].to_vec(),
        });
        current += rows;
    }

    jobs.execute(&mut bands, |band| {
        let band_height = band.data.len() / stride;
        blur_serial(&mut band.data, width, band_height, kernel_x, kernel_y, alpha_only);
    });

    let data = buffer.data_mut();
    for band in &bands {
        let own = band.start_row + band.skip;
        let from = band.skip * stride;
        data[own * stride..(own + band.rows) * stride]
            .copy_from_slice(&band.data[from..from + band.rows * stride]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::AlphaRepresentation;
    use crate::core::geometry::IntRect;
    use crate::core::parallel::ParallelJobs;
    use crate::effects::testing::{noise, Harness};
    use crate::effects::EffectKind;

    #[test]
    fn test_kernel_size() {
        assert_eq!(kernel_size(0.0), 0);
        assert_eq!(kernel_size(-1.0), 0);
        assert_eq!(kernel_size(f32::NAN), 0);
        assert_eq!(kernel_size(0.1), 2);
        // 2 * 1.88 + 0.5 = 4.26
        assert_eq!(kernel_size(2.0), 4);
        assert_eq!(kernel_size(10.0), 19);
        assert_eq!(kernel_size(1.0e6), MAX_KERNEL_SIZE);
    }

    #[test]
    fn test_kernel_positions_even() {
        let (mut size, mut left, mut right) = (4, 0, 0);
        kernel_position(0, &mut size, &mut left, &mut right);
        assert_eq!((size, left, right), (4, 1, 3));
        kernel_position(1, &mut size, &mut left, &mut right);
        assert_eq!((size, left, right), (4, 2, 2));
        kernel_position(2, &mut size, &mut left, &mut right);
        assert_eq!((size, left, right), (5, 2, 3));
    }

    #[test]
    fn test_kernel_positions_odd() {
        let (mut size, mut left, mut right) = (5, 0, 0);
        for pass in 0..3 {
            kernel_position(pass, &mut size, &mut left, &mut right);
            assert_eq!((size, left, right), (5, 2, 3));
        }
    }

    #[test]
    fn test_constant_interior_is_preserved() {
        let rect = IntRect::new(0, 0, 30, 30);
        let mut image = PixelBuffer::new(30, 30, AlphaRepresentation::Premultiplied);
        image.fill([100, 50, 25, 200]);
        let h = Harness::new().input(rect, image);
        let out = h.run(&EffectKind::GaussianBlur(GaussianBlur::new(2.0, 2.0)), rect);
        assert_eq!(out.pixel(15, 15), [100, 50, 25, 200]);
        // The edges fade because taps past the buffer read nothing.
        assert!(out.pixel(0, 0)[3] < 200);
    }

    #[test]
    fn test_zero_deviation_is_identity() {
        let rect = IntRect::new(0, 0, 8, 8);
        let h = Harness::new().input(rect, noise(8, 8, 11));
        let out = h.run(&EffectKind::GaussianBlur(GaussianBlur::new(0.0, 0.0)), rect);
        assert_eq!(out.data(), h.inputs[0].image.data());
    }

    #[test]
    fn test_alpha_only() {
        let mut buffer = PixelBuffer::new(10, 1, AlphaRepresentation::Premultiplied);
        buffer.set_pixel(5, 0, [0, 0, 0, 255]);
        blur(&mut buffer, 3, 0, true, &ParallelSettings::serial());
        assert!(buffer.data().chunks_exact(4).all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));
        assert!(buffer.pixel(4, 0)[3] > 0);
    }

    #[test]
    fn test_single_axis() {
        let mut buffer = PixelBuffer::new(9, 9, AlphaRepresentation::Premultiplied);
        buffer.set_pixel(4, 4, [255, 255, 255, 255]);
        blur(&mut buffer, 3, 0, false, &ParallelSettings::serial());
        assert_eq!(buffer.pixel(4, 3), [0, 0, 0, 0]);
        assert!(buffer.pixel(3, 4)[3] > 0);
    }

    #[test]
    fn test_banded_matches_serial() {
        if ParallelJobs::new(4).number_of_jobs() < 2 {
            return;
        }
        for (kx, ky) in [(4, 4), (7, 3), (0, 6), (5, 0)] {
            let mut serial = noise(50, 120, 5);
            let mut banded = serial.clone();
            blur(&mut serial, kx, ky, false, &ParallelSettings::serial());
            let settings = ParallelSettings {
                min_area: 10,
                ..ParallelSettings::default()
            };
            blur(&mut banded, kx, ky, false, &settings);
            assert_eq!(serial, banded, "kernel {kx}x{ky}");
        }
    }

    #[test]
    fn test_map_paint_rect() {
        let blur = GaussianBlur::new(2.0, 0.0);
        let rect = blur.map_paint_rect(FloatRect::new(0.0, 0.0, 10.0, 10.0), &FilterRegion::default());
        assert_eq!(rect, FloatRect::new(-6.0, 0.0, 22.0, 10.0));
    }

    #[test]
    fn test_parameter_errors() {
        assert!(GaussianBlur::new(1.0, 0.0).parameter_errors().is_empty());
        assert_eq!(GaussianBlur::new(-1.0, f32::NAN).parameter_errors().len(), 2);
    }
}
