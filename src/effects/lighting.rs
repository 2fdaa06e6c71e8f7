//! DiffuseLighting and SpecularLighting: light the alpha channel as a bump map.
//!
//! Surface normals come from Sobel operators over the alpha plane, with
//! reduced kernels along the edges and at the corners. Edge pixels are lit
//! serially, interior rows are split across the pool.

use super::flood::color_in_space;
use super::light_source::{LightSource, PreparedLight};
use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::geometry::{Color, FloatPoint3D, FloatRect};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

const MIN_SPECULAR_EXPONENT: f32 = 1.0;
const MAX_SPECULAR_EXPONENT: f32 = 128.0;

/// Lambertian lighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffuseLighting {
    /// Device RGB light color.
    pub lighting_color: Color,
    /// Height of an opaque pixel.
    pub surface_scale: f32,
    /// `kd`, non-negative.
    pub diffuse_constant: f32,
    /// The light.
    pub light_source: LightSource,
}

impl Default for DiffuseLighting {
    fn default() -> Self {
        Self {
            lighting_color: Color::rgba(255, 255, 255, 255),
            surface_scale: 1.0,
            diffuse_constant: 1.0,
            light_source: LightSource::default(),
        }
    }
}

/// Phong specular lighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecularLighting {
    /// Device RGB light color.
    pub lighting_color: Color,
    /// Height of an opaque pixel.
    pub surface_scale: f32,
    /// `ks`, non-negative.
    pub specular_constant: f32,
    /// Shininess, in [1, 128].
    pub specular_exponent: f32,
    /// The light.
    pub light_source: LightSource,
}

impl Default for SpecularLighting {
    fn default() -> Self {
        Self {
            lighting_color: Color::rgba(255, 255, 255, 255),
            surface_scale: 1.0,
            specular_constant: 1.0,
            specular_exponent: 1.0,
            light_source: LightSource::default(),
        }
    }
}

impl DiffuseLighting {
    /// Diffuse lighting with `light_source`.
    pub fn new(light_source: LightSource) -> Self {
        Self {
            light_source,
            ..Self::default()
        }
    }

    /// Returns true when the value changed.
    pub fn set_lighting_color(&mut self, color: Color) -> bool {
        replace(&mut self.lighting_color, color)
    }

    /// Returns true when the value changed.
    pub fn set_surface_scale(&mut self, surface_scale: f32) -> bool {
        replace(&mut self.surface_scale, surface_scale)
    }

    /// Returns true when the value changed.
    pub fn set_diffuse_constant(&mut self, diffuse_constant: f32) -> bool {
        replace(&mut self.diffuse_constant, diffuse_constant)
    }

    /// Returns true when the value changed.
    pub fn set_light_source(&mut self, light_source: LightSource) -> bool {
        replace(&mut self.light_source, light_source)
    }

    pub(crate) fn parameter_errors(&self) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        if self.diffuse_constant < 0.0 {
            errors.push((
                "diffuseConstant".to_string(),
                format!("must be non-negative, got {}", self.diffuse_constant),
            ));
        }
        errors
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        render(
            ctx,
            Model::Diffuse {
                kd: self.diffuse_constant,
            },
            self.surface_scale,
            self.lighting_color,
            &self.light_source,
        )
    }

    pub(crate) fn write_parameters(&self, out: &mut String) -> fmt::Result {
        write!(
            out,
            " lighting-color=\"{}\" surfaceScale=\"{}\" diffuseConstant=\"{}\"",
            super::flood::color_name(self.lighting_color),
            self.surface_scale,
            self.diffuse_constant
        )?;
        self.light_source.write_parameters(out)
    }
}

impl SpecularLighting {
    /// Specular lighting with `light_source`.
    pub fn new(light_source: LightSource) -> Self {
        Self {
            light_source,
            ..Self::default()
        }
    }

    /// Returns true when the value changed.
    pub fn set_lighting_color(&mut self, color: Color) -> bool {
        replace(&mut self.lighting_color, color)
    }

    /// Returns true when the value changed.
    pub fn set_surface_scale(&mut self, surface_scale: f32) -> bool {
        replace(&mut self.surface_scale, surface_scale)
    }

    /// Returns true when the value changed.
    pub fn set_specular_constant(&mut self, specular_constant: f32) -> bool {
        replace(&mut self.specular_constant, specular_constant)
    }

    /// Returns true when the value changed.
    pub fn set_specular_exponent(&mut self, specular_exponent: f32) -> bool {
        replace(&mut self.specular_exponent, specular_exponent)
    }

    /// Returns true when the value changed.
    pub fn set_light_source(&mut self, light_source: LightSource) -> bool {
        replace(&mut self.light_source, light_source)
    }

    pub(crate) fn parameter_errors(&self) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        if self.specular_constant < 0.0 {
            errors.push((
                "specularConstant".to_string(),
                format!("must be non-negative, got {}", self.specular_constant),
            ));
        }
        if !(MIN_SPECULAR_EXPONENT..=MAX_SPECULAR_EXPONENT).contains(&self.specular_exponent) {
            errors.push((
                "specularExponent".to_string(),
                format!(
                    "must be in [{MIN_SPECULAR_EXPONENT}, {MAX_SPECULAR_EXPONENT}], got {}",
                    self.specular_exponent
                ),
            ));
        }
        errors
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        render(
            ctx,
            Model::Specular {
                ks: self.specular_constant,
                exponent: self.specular_exponent,
            },
            self.surface_scale,
            self.lighting_color,
            &self.light_source,
        )
    }

    pub(crate) fn write_parameters(&self, out: &mut String) -> fmt::Result {
        write!(
            out,
            " lighting-color=\"{}\" surfaceScale=\"{}\" specularConstant=\"{}\" specularExponent=\"{}\"",
            super::flood::color_name(self.lighting_color),
            self.surface_scale,
            self.specular_constant,
            self.specular_exponent
        )?;
        self.light_source.write_parameters(out)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Sobel kernels read one pixel past the result on every side.
pub(crate) fn map_paint_rect(mut rect: FloatRect) -> FloatRect {
    rect.inflate(1.0);
    rect
}

#[derive(Debug, Clone, Copy)]
enum Model {
    Diffuse { kd: f32 },
    Specular { ks: f32, exponent: f32 },
}

/// Read-only state shared by every pixel of one render.
struct Surface<'a> {
    alpha: &'a [u8],
    width: usize,
    height: usize,
    surface_scale: f32,
    model: Model,
    light: PreparedLight,
}

fn render(
    ctx: &ApplyContext<'_>,
    model: Model,
    surface_scale: f32,
    lighting_color: Color,
    light_source: &LightSource,
) -> PixelBuffer {
    let source = ctx.input_unmultiplied(0);
    let (width, height) = (source.width(), source.height());
    let mut out = PixelBuffer::new(width, height, AlphaRepresentation::Premultiplied);
    if width <= 2 || height <= 2 {
        return out;
    }

    let alpha: Vec<u8> = source.data().chunks_exact(4).map(|p| p[3]).collect();
    let color = color_in_space(lighting_color, ctx.operating_color_space);
    let light = light_source.prepare(
        ctx.filter,
        ctx.paint_rect.location(),
        [color.r as f32, color.g as f32, color.b as f32],
    );
    let surface = Surface {
        alpha: &alpha,
        width,
        height,
        surface_scale: surface_scale / 255.0,
        model,
        light,
    };

    let stride = out.stride();
    {
        let data = out.data_mut();
        let (first, rest) = data.split_at_mut(stride);
        let (interior, last) = rest.split_at_mut(stride * (height - 2));

        for x in 0..width {
            surface.light_pixel(x, 0, &mut first[x * 4..x * 4 + 4]);
            surface.light_pixel(x, height - 1, &mut last[x * 4..x * 4 + 4]);
        }
        for (i, row) in interior.chunks_exact_mut(stride).enumerate() {
            let y = i + 1;
            surface.light_pixel(0, y, &mut row[..4]);
            surface.light_pixel(width - 1, y, &mut row[(width - 1) * 4..]);
        }

        let jobs = ctx.parallel.jobs_for(width * height, ctx.parallel.min_area);
        jobs.execute_rows(interior, stride, |first_row, rows| {
            for (i, row) in rows.chunks_exact_mut(stride).enumerate() {
                let y = first_row + i + 1;
                for x in 1..width - 1 {
                    surface.light_pixel(x, y, &mut row[x * 4..x * 4 + 4]);
                }
            }
        });
    }
    out
}

impl Surface<'_> {
    #[inline]
    fn a(&self, x: usize, y: usize) -> i32 {
        self.alpha[y * self.width + x] as i32
    }

    /// Sobel normal at `(x, y)` as `(factor_x, nx, factor_y, ny)`.
    ///
    /// Requires a surface of at least 3x3.
    fn normal(&self, x: usize, y: usize) -> (f32, i32, f32, i32) {
        let last_x = self.width - 1;
        let last_y = self.height - 1;
        let c = self.a(x, y);

        match (y, x) {
            (0, 0) => {
                let (r, b, br) = (self.a(1, 0), self.a(0, 1), self.a(1, 1));
                (2.0 / 3.0, -2 * c + 2 * r - b + br, 2.0 / 3.0, -2 * c - r + 2 * b + br)
            }
            (0, x) if x == last_x => {
                let (l, bl, b) = (self.a(x - 1, 0), self.a(x - 1, 1), self.a(x, 1));
                (2.0 / 3.0, -2 * l + 2 * c - bl + b, 2.0 / 3.0, -l - 2 * c + bl + 2 * b)
            }
            (0, x) => {
                let (l, r) = (self.a(x - 1, 0), self.a(x + 1, 0));
                let (bl, b, br) = (self.a(x - 1, 1), self.a(x, 1), self.a(x + 1, 1));
                (
                    1.0 / 3.0,
                    -2 * l + 2 * r - bl + br,
                    1.0 / 2.0,
                    -l - 2 * c - r + bl + 2 * b + br,
                )
            }
            (y, 0) if y == last_y => {
                let (t, tr, r) = (self.a(0, y - 1), self.a(1, y - 1), self.a(1, y));
                (2.0 / 3.0, -t + tr - 2 * c + 2 * r, 2.0 / 3.0, -2 * t - tr + 2 * c + r)
            }
            (y, x) if y == last_y && x == last_x => {
                let (tl, t, l) = (self.a(x - 1, y - 1), self.a(x, y - 1), self.a(x - 1, y));
                (2.0 / 3.0, -tl + t - 2 * l + 2 * c, 2.0 / 3.0, -tl - 2 * t + l + 2 * c)
            }
            (y, x) if y == last_y => {
                let (tl, t, tr) = (self.a(x - 1, y - 1), self.a(x, y - 1), self.a(x + 1, y - 1));
                let (l, r) = (self.a(x - 1, y), self.a(x + 1, y));
                (
                    1.0 / 3.0,
                    -tl + tr - 2 * l + 2 * r,
                    1.0 / 2.0,
                    -tl - 2 * t - tr + l + 2 * c + r,
                )
            }
            (y, 0) => {
                let (t, tr, r) = (self.a(0, y - 1), self.a(1, y - 1), self.a(1, y));
                let (b, br) = (self.a(0, y + 1), self.a(1, y + 1));
                (
                    1.0 / 2.0,
                    -t + tr - 2 * c + 2 * r - b + br,
                    1.0 / 3.0,
                    -2 * t - tr + 2 * b + br,
                )
            }
            (y, x) if x == last_x => {
                let (tl, t, l) = (self.a(x - 1, y - 1), self.a(x, y - 1), self.a(x - 1, y));
                let (bl, b) = (self.a(x - 1, y + 1), self.a(x, y + 1));
                (
                    1.0 / 2.0,
                    -tl + t - 2 * l + 2 * c - bl + b,
                    1.0 / 3.0,
                    -tl - 2 * t + bl + 2 * b,
                )
            }
            (y, x) => {
                let (tl, t, tr) = (self.a(x - 1, y - 1), self.a(x, y - 1), self.a(x + 1, y - 1));
                let (l, r) = (self.a(x - 1, y), self.a(x + 1, y));
                let (bl, b, br) = (self.a(x - 1, y + 1), self.a(x, y + 1), self.a(x + 1, y + 1));
                (
                    1.0 / 4.0,
                    -tl + tr - 2 * l + 2 * r - bl + br,
                    1.0 / 4.0,
                    -tl - 2 * t - tr + bl + 2 * b + br,
                )
            }
        }
    }

    fn light_pixel(&self, x: usize, y: usize, pixel: &mut [u8]) {
        let (factor_x, nx, factor_y, ny) = self.normal(x, y);
        let z = self.surface_scale * self.a(x, y) as f32;
        let sample = self.light.sample(x as f32, y as f32, z);
        let light = sample.vector;

        // Flat surface: the normal is (0, 0, 1).
        let normal = if nx == 0 && ny == 0 {
            None
        } else {
            Some(FloatPoint3D::new(
                -factor_x * nx as f32 * self.surface_scale,
                -factor_y * ny as f32 * self.surface_scale,
                1.0,
            ))
        };

        let strength = match self.model {
            Model::Diffuse { kd } => {
                if sample.length == 0.0 {
                    0.0
                } else {
                    match normal {
                        None => kd * light.z / sample.length,
                        Some(n) => kd * n.dot(light) / (n.length() * sample.length),
                    }
                }
            }
            Model::Specular { ks, exponent } => {
                let halfway = FloatPoint3D::new(light.x, light.y, light.z + sample.length);
                let halfway_length = halfway.length();
                if halfway_length == 0.0 {
                    0.0
                } else {
                    let cosine = match normal {
                        None => halfway.z / halfway_length,
                        Some(n) => n.dot(halfway) / (n.length() * halfway_length),
                    };
                    if exponent == 1.0 {
                        ks * cosine
                    } else {
                        ks * cosine.powf(exponent)
                    }
                }
            }
        };
        let strength = if strength.is_nan() { 0.0 } else { strength.clamp(0.0, 1.0) };

        let r = (strength * sample.color[0]) as u8;
        let g = (strength * sample.color[1]) as u8;
        let b = (strength * sample.color[2]) as u8;
        let a = match self.model {
            Model::Diffuse { .. } => 255,
            Model::Specular { .. } => r.max(g).max(b),
        };
        pixel.copy_from_slice(&[r, g, b, a]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color_space::ColorSpace;
    use crate::core::geometry::IntRect;
    use crate::core::parallel::{ParallelJobs, ParallelSettings};
    use crate::effects::testing::{noise, solid, Harness};
    use crate::effects::EffectKind;

    fn overhead() -> LightSource {
        LightSource::Distant {
            azimuth: 0.0,
            elevation: 90.0,
        }
    }

    fn opaque(size: i32) -> (Harness, IntRect) {
        let rect = IntRect::new(0, 0, size, size);
        let image = solid(rect, [0, 0, 0, 255], AlphaRepresentation::Premultiplied);
        (Harness::new().input(rect, image), rect)
    }

    #[test]
    fn test_flat_surface_overhead_diffuse() {
        let (h, rect) = opaque(5);
        let out = h.run(&EffectKind::DiffuseLighting(DiffuseLighting::new(overhead())), rect);
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(out.pixel(x, y), [255, 255, 255, 255]);
            }
        }
    }

    #[test]
    fn test_diffuse_elevation_scales_strength() {
        let (mut h, rect) = opaque(4);
        let mut lighting = DiffuseLighting::new(LightSource::Distant {
            azimuth: 0.0,
            elevation: 30.0,
        });
        lighting.set_lighting_color(Color::rgba(200, 200, 200, 255));
        h.color_space = ColorSpace::DeviceRgb;
        let out = h.run(&EffectKind::DiffuseLighting(lighting), rect);
        // sin(30°) * 200
        let [r, _, _, a] = out.pixel(1, 1);
        assert!((99..=100).contains(&r), "{r}");
        assert_eq!(a, 255);
    }

    #[test]
    fn test_flat_surface_overhead_specular() {
        let (h, rect) = opaque(4);
        let out = h.run(&EffectKind::SpecularLighting(SpecularLighting::new(overhead())), rect);
        assert_eq!(out.pixel(2, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn test_specular_alpha_is_max_channel() {
        let (mut h, rect) = opaque(4);
        h.color_space = ColorSpace::DeviceRgb;
        let mut lighting = SpecularLighting::new(overhead());
        lighting.set_lighting_color(Color::rgba(40, 120, 80, 255));
        let out = h.run(&EffectKind::SpecularLighting(lighting), rect);
        assert_eq!(out.pixel(1, 1), [40, 120, 80, 120]);
    }

    #[test]
    fn test_too_small_is_transparent() {
        let (h, _) = opaque(2);
        let rect = IntRect::new(0, 0, 2, 8);
        let out = h.run(&EffectKind::DiffuseLighting(DiffuseLighting::new(overhead())), rect);
        assert!(out.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_slope_tilts_normal_towards_light() {
        // Alpha ramps up to the right; a light from the left (azimuth 180)
        // faces the slope and must be brighter than a light from the right.
        let rect = IntRect::new(0, 0, 5, 5);
        let mut image = PixelBuffer::new(5, 5, AlphaRepresentation::Unmultiplied);
        for y in 0..5 {
            for x in 0..5 {
                image.set_pixel(x, y, [0, 0, 0, (x * 60) as u8]);
            }
        }
        let mut h = Harness::new().input(rect, image);
        h.color_space = ColorSpace::DeviceRgb;
        let light = |azimuth| {
            let mut lighting = DiffuseLighting::new(LightSource::Distant {
                azimuth,
                elevation: 45.0,
            });
            lighting.set_surface_scale(5.0);
            EffectKind::DiffuseLighting(lighting)
        };
        let facing = h.run(&light(180.0), rect).pixel(2, 2)[0];
        let away = h.run(&light(0.0), rect).pixel(2, 2)[0];
        assert!(facing > away, "{facing} <= {away}");
    }

    #[test]
    fn test_point_light_falls_off() {
        let (mut h, rect) = opaque(21);
        h.color_space = ColorSpace::DeviceRgb;
        let lighting = DiffuseLighting::new(LightSource::Point {
            position: FloatPoint3D::new(10.0, 10.0, 10.0),
        });
        let out = h.run(&EffectKind::DiffuseLighting(lighting), rect);
        // Surface sits at z = 1, the light at z = 10 straight above.
        assert_eq!(out.pixel(10, 10)[0], 255);
        assert!(out.pixel(1, 10)[0] < out.pixel(5, 10)[0]);
    }

    #[test]
    fn test_parameter_errors() {
        let mut diffuse = DiffuseLighting::default();
        assert!(diffuse.parameter_errors().is_empty());
        diffuse.set_diffuse_constant(-1.0);
        assert_eq!(diffuse.parameter_errors()[0].0, "diffuseConstant");

        let mut specular = SpecularLighting::default();
        assert!(specular.parameter_errors().is_empty());
        specular.set_specular_exponent(200.0);
        assert_eq!(specular.parameter_errors()[0].0, "specularExponent");
    }

    #[test]
    fn test_map_paint_rect() {
        assert_eq!(
            map_paint_rect(FloatRect::new(0.0, 0.0, 4.0, 4.0)),
            FloatRect::new(-1.0, -1.0, 6.0, 6.0)
        );
    }

    #[test]
    fn test_parallel_matches_serial() {
        if ParallelJobs::new(4).number_of_jobs() < 2 {
            return;
        }
        let rect = IntRect::new(0, 0, 48, 40);
        let mut lighting = SpecularLighting::new(LightSource::Spot {
            position: FloatPoint3D::new(20.0, 10.0, 30.0),
            points_at: FloatPoint3D::new(24.0, 20.0, 0.0),
            specular_exponent: 4.0,
            limiting_cone_angle: Some(35.0),
        });
        lighting.set_specular_exponent(8.0);
        lighting.set_surface_scale(3.0);
        let kind = EffectKind::SpecularLighting(lighting);
        let serial = Harness::new().input(rect, noise(48, 40, 11)).run(&kind, rect);
        let parallel = Harness::new()
            .input(rect, noise(48, 40, 11))
            .parallel(ParallelSettings {
                min_area: 100,
                ..ParallelSettings::default()
            })
            .run(&kind, rect);
        assert_eq!(serial, parallel);
    }
}
