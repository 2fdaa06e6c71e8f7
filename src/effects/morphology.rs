//! Morphology: erode (minimum) or dilate (maximum) over an elliptical window.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::geometry::FloatRect;
use crate::core::region::FilterRegion;
use serde::{Deserialize, Serialize};

/// Erode or dilate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphologyOperator {
    /// Per channel minimum.
    #[default]
    Erode,
    /// Per channel maximum.
    Dilate,
}

impl MorphologyOperator {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            MorphologyOperator::Erode => "erode",
            MorphologyOperator::Dilate => "dilate",
        }
    }
}

/// Morphology parameters, radii in local units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Morphology {
    /// Erode or dilate.
    pub operator: MorphologyOperator,
    /// Horizontal radius.
    pub radius_x: f32,
    /// Vertical radius.
    pub radius_y: f32,
}

impl Morphology {
    /// A morphology node.
    pub fn new(operator: MorphologyOperator, radius_x: f32, radius_y: f32) -> Self {
        Self {
            operator,
            radius_x,
            radius_y,
        }
    }

    /// Returns true when the value changed.
    pub fn set_operator(&mut self, operator: MorphologyOperator) -> bool {
        if self.operator == operator {
            return false;
        }
        self.operator = operator;
        true
    }

    /// Returns true when the value changed.
    pub fn set_radius(&mut self, radius_x: f32, radius_y: f32) -> bool {
        if self.radius_x == radius_x && self.radius_y == radius_y {
            return false;
        }
        self.radius_x = radius_x;
        self.radius_y = radius_y;
        true
    }

    pub(crate) fn map_paint_rect(&self, mut rect: FloatRect, filter: &FilterRegion) -> FloatRect {
        rect.inflate_x(filter.apply_horizontal_scale(self.radius_x));
        rect.inflate_y(filter.apply_vertical_scale(self.radius_y));
        rect
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let rx = ctx.filter.apply_horizontal_scale(self.radius_x).floor();
        let ry = ctx.filter.apply_vertical_scale(self.radius_y).floor();
        if rx < 0.0 || ry < 0.0 {
            return ctx.transparent(AlphaRepresentation::Premultiplied);
        }
        let source = ctx.input_premultiplied(0);
        if source.is_empty() {
            return source;
        }
        let rx = (rx as usize).min(source.width() - 1);
        let ry = (ry as usize).min(source.height() - 1);
        if rx == 0 || ry == 0 {
            return source;
        }

        let mut out = PixelBuffer::new(source.width(), source.height(), AlphaRepresentation::Premultiplied);
        let area = source.width() * source.height();
        let jobs = ctx.parallel.jobs_for(area, ctx.parallel.morphology_min_area);
        let stride = out.stride();
        let extents = half_widths(rx, ry);
        let operator = self.operator;
        jobs.execute_rows(out.data_mut(), stride, |first_row, rows| {
            for (i, row) in rows.chunks_exact_mut(stride).enumerate() {
                morph_row(&source, first_row + i, row, &extents, ry, operator);
            }
        });
        out
    }
}

/// Horizontal half width of the ellipse at each vertical offset `0..=ry`.
fn half_widths(rx: usize, ry: usize) -> Vec<usize> {
    (0..=ry)
        .map(|dy| {
            let t = dy as f32 / ry as f32;
            (rx as f32 * (1.0 - t * t).max(0.0).sqrt()).floor() as usize
        })
        .collect()
}

fn morph_row(
    source: &PixelBuffer,
    y: usize,
    row: &mut [u8],
    extents: &[usize],
    ry: usize,
    operator: MorphologyOperator,
) {
    let width = source.width();
    let height = source.height();
    let data = source.data();
    let y0 = y.saturating_sub(ry);
    let y1 = (y + ry).min(height - 1);
    for x in 0..width {
        let mut acc = match operator {
            MorphologyOperator::Erode => [255u8; 4],
            MorphologyOperator::Dilate => [0u8; 4],
        };
        for sy in y0..=y1 {
            let half = extents[sy.abs_diff(y)];
            let x0 = x.saturating_sub(half);
            let x1 = (x + half).min(width - 1);
            let line = &data[sy * width * 4..(sy + 1) * width * 4];
            for pixel in line[x0 * 4..(x1 + 1) * 4].chunks_exact(4) {
                for c in 0..4 {
                    acc[c] = match operator {
                        MorphologyOperator::Erode => acc[c].min(pixel[c]),
                        MorphologyOperator::Dilate => acc[c].max(pixel[c]),
                    };
                }
            }
        }
        row[x * 4..x * 4 + 4].copy_from_slice(&acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::IntRect;
    use crate::core::parallel::{ParallelJobs, ParallelSettings};
    use crate::effects::testing::{noise, Harness};
    use crate::effects::EffectKind;

    fn dot(size: usize) -> (Harness, IntRect) {
        let rect = IntRect::new(0, 0, size as i32, size as i32);
        let mut image = PixelBuffer::new(size, size, AlphaRepresentation::Premultiplied);
        image.set_pixel(size / 2, size / 2, [255, 255, 255, 255]);
        (Harness::new().input(rect, image), rect)
    }

    #[test]
    fn test_dilate_is_elliptical() {
        let (h, rect) = dot(9);
        let out = h.run(&EffectKind::Morphology(Morphology::new(MorphologyOperator::Dilate, 2.0, 2.0)), rect);
        // Axis neighbours within the radius are lit, the (2, 2) diagonal is not.
        assert_eq!(out.pixel(6, 4), [255; 4]);
        assert_eq!(out.pixel(4, 2), [255; 4]);
        assert_eq!(out.pixel(5, 5), [255; 4]);
        assert_eq!(out.pixel(6, 6), [0; 4]);
        assert_eq!(out.pixel(7, 4), [0; 4]);
    }

    #[test]
    fn test_erode_removes_dot() {
        let (h, rect) = dot(5);
        let out = h.run(&EffectKind::Morphology(Morphology::new(MorphologyOperator::Erode, 1.0, 1.0)), rect);
        assert!(out.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_radius_copies_and_negative_clears() {
        let (h, rect) = dot(5);
        let copy = h.run(&EffectKind::Morphology(Morphology::new(MorphologyOperator::Dilate, 0.0, 3.0)), rect);
        assert_eq!(copy.data(), h.inputs[0].image.data());

        let cleared = h.run(&EffectKind::Morphology(Morphology::new(MorphologyOperator::Dilate, -1.0, 3.0)), rect);
        assert!(cleared.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_radius_is_scaled() {
        let rect = IntRect::new(0, 0, 9, 9);
        let mut image = PixelBuffer::new(9, 9, AlphaRepresentation::Premultiplied);
        image.set_pixel(4, 4, [255, 255, 255, 255]);
        let mut h = Harness::new().input(rect, image);
        h.filter = FilterRegion::default().with_scale(2.0, 2.0);
        let out = h.run(&EffectKind::Morphology(Morphology::new(MorphologyOperator::Dilate, 1.0, 1.0)), rect);
        assert_eq!(out.pixel(6, 4), [255; 4]);
    }

    #[test]
    fn test_map_paint_rect() {
        let m = Morphology::new(MorphologyOperator::Erode, 2.0, 3.0);
        let rect = m.map_paint_rect(FloatRect::new(0.0, 0.0, 10.0, 10.0), &FilterRegion::default());
        assert_eq!(rect, FloatRect::new(-2.0, -3.0, 14.0, 16.0));
    }

    #[test]
    fn test_parallel_matches_serial() {
        if ParallelJobs::new(4).number_of_jobs() < 2 {
            return;
        }
        let rect = IntRect::new(0, 0, 40, 30);
        let kind = EffectKind::Morphology(Morphology::new(MorphologyOperator::Dilate, 3.0, 2.0));
        let serial = Harness::new().input(rect, noise(40, 30, 3)).run(&kind, rect);
        let parallel = Harness::new()
            .input(rect, noise(40, 30, 3))
            .parallel(ParallelSettings {
                morphology_min_area: 100,
                ..ParallelSettings::default()
            })
            .run(&kind, rect);
        assert_eq!(serial, parallel);
    }
}
