//! Turbulence: Perlin noise, fractal or turbulent, optionally stitched.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::geometry::{FloatPoint, FloatRect};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

const BLOCK_SIZE: usize = 256;
const BLOCK_MASK: i32 = BLOCK_SIZE as i32 - 1;
const PERLIN_NOISE: i32 = 4096;

const RAND_MAXIMUM: i64 = 2_147_483_647;
const RAND_AMPLITUDE: i64 = 16_807;
const RAND_Q: i64 = 127_773;
const RAND_R: i64 = 2_836;

/// Fractal noise or turbulence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurbulenceType {
    /// Signed octaves, mapped around mid grey.
    FractalNoise,
    /// Absolute octaves.
    #[default]
    Turbulence,
}

impl TurbulenceType {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            TurbulenceType::FractalNoise => "fractalNoise",
            TurbulenceType::Turbulence => "turbulence",
        }
    }
}

/// Turbulence parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Turbulence {
    /// Noise kind.
    pub turbulence_type: TurbulenceType,
    /// Horizontal base frequency, local units.
    pub base_frequency_x: f32,
    /// Vertical base frequency, local units.
    pub base_frequency_y: f32,
    /// Number of octaves summed.
    pub num_octaves: i32,
    /// PRNG seed, rounded to an integer.
    pub seed: f32,
    /// Snap frequencies so the primitive subregion tiles seamlessly.
    pub stitch_tiles: bool,
}

impl Default for Turbulence {
    fn default() -> Self {
        Self {
            turbulence_type: TurbulenceType::Turbulence,
            base_frequency_x: 0.0,
            base_frequency_y: 0.0,
            num_octaves: 1,
            seed: 0.0,
            stitch_tiles: false,
        }
    }
}

impl Turbulence {
    /// Turbulence of `turbulence_type` at the given base frequencies.
    pub fn new(turbulence_type: TurbulenceType, base_frequency_x: f32, base_frequency_y: f32) -> Self {
        Self {
            turbulence_type,
            base_frequency_x,
            base_frequency_y,
            ..Self::default()
        }
    }

    /// Returns true when the value changed.
    pub fn set_type(&mut self, turbulence_type: TurbulenceType) -> bool {
        replace(&mut self.turbulence_type, turbulence_type)
    }

    /// Returns true when the value changed.
    pub fn set_base_frequency(&mut self, x: f32, y: f32) -> bool {
        let changed = replace(&mut self.base_frequency_x, x);
        replace(&mut self.base_frequency_y, y) || changed
    }

    /// Returns true when the value changed.
    pub fn set_num_octaves(&mut self, num_octaves: i32) -> bool {
        replace(&mut self.num_octaves, num_octaves)
    }

    /// Returns true when the value changed.
    pub fn set_seed(&mut self, seed: f32) -> bool {
        replace(&mut self.seed, seed)
    }

    /// Returns true when the value changed.
    pub fn set_stitch_tiles(&mut self, stitch_tiles: bool) -> bool {
        replace(&mut self.stitch_tiles, stitch_tiles)
    }

    pub(crate) fn parameter_errors(&self) -> Vec<(String, String)> {
        let mut errors = Vec::new();
        if self.base_frequency_x < 0.0 || self.base_frequency_y < 0.0 {
            errors.push((
                "baseFrequency".to_string(),
                format!(
                    "must be non-negative, got {}, {}",
                    self.base_frequency_x, self.base_frequency_y
                ),
            ));
        }
        if self.num_octaves < 0 {
            errors.push((
                "numOctaves".to_string(),
                format!("must be non-negative, got {}", self.num_octaves),
            ));
        }
        errors
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let mut out = ctx.transparent(AlphaRepresentation::Unmultiplied);
        if out.is_empty() {
            return out;
        }

        let painting = PaintingData::new(self.seed);
        let tile = ctx.primitive_subregion;
        let stitch = Stitch::new(self, tile);
        let origin = ctx.paint_rect.location();
        let width = out.width();
        let stride = out.stride();
        let jobs = ctx.parallel.jobs_for(width * out.height(), ctx.parallel.min_area);

        jobs.execute_rows(out.data_mut(), stride, |first_row, rows| {
            for (i, row) in rows.chunks_exact_mut(stride).enumerate() {
                let y = origin.y + (first_row + i) as i32;
                for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
                    let absolute = FloatPoint::new((origin.x + x as i32) as f32, y as f32);
                    let point = ctx.filter.map_absolute_point_to_local(absolute);
                    for (channel, value) in pixel.iter_mut().enumerate() {
                        *value = self.value_for_point(channel, &painting, &stitch, point);
                    }
                }
            }
        });
        out
    }

    /// One channel of the noise at a local point, in [0, 255].
    fn value_for_point(&self, channel: usize, painting: &PaintingData, initial: &Stitch, point: FloatPoint) -> u8 {
        let mut stitch = initial.state;
        let mut vector = FloatPoint::new(point.x * initial.frequency_x, point.y * initial.frequency_y);
        let mut ratio = 1.0f32;
        let mut sum = 0.0f32;
        for _ in 0..self.num_octaves {
            let noise = painting.noise2d(channel, stitch.as_ref(), vector);
            sum += match self.turbulence_type {
                TurbulenceType::FractalNoise => noise / ratio,
                TurbulenceType::Turbulence => noise.abs() / ratio,
            };
            vector = FloatPoint::new(vector.x * 2.0, vector.y * 2.0);
            ratio *= 2.0;
            if let Some(state) = stitch.as_mut() {
                state.width = state.width.saturating_mul(2);
                state.wrap_x = state.wrap_x.saturating_mul(2).saturating_sub(PERLIN_NOISE);
                state.height = state.height.saturating_mul(2);
                state.wrap_y = state.wrap_y.saturating_mul(2).saturating_sub(PERLIN_NOISE);
            }
        }
        if self.turbulence_type == TurbulenceType::FractalNoise {
            sum = sum * 0.5 + 0.5;
        }
        (sum.clamp(0.0, 1.0) * 255.0) as u8
    }

    pub(crate) fn write_parameters(&self, out: &mut String) -> fmt::Result {
        write!(
            out,
            " type=\"{}\" baseFrequency=\"{}, {}\" numOctaves=\"{}\" seed=\"{}\" stitchTiles=\"{}\"",
            self.turbulence_type.name(),
            self.base_frequency_x,
            self.base_frequency_y,
            self.num_octaves,
            self.seed,
            if self.stitch_tiles { "stitch" } else { "noStitch" }
        )
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Park–Miller minimal standard generator, via Schrage's method.
#[derive(Debug, Clone)]
struct Random {
    seed: i64,
}

impl Random {
    fn new(seed: f32) -> Self {
        let mut seed = seed.round() as i64;
        if seed <= 0 {
            seed = -(seed % (RAND_MAXIMUM - 1)) + 1;
        }
        if seed > RAND_MAXIMUM - 1 {
            seed = RAND_MAXIMUM - 1;
        }
        Self { seed }
    }

    /// Next value in [1, 2^31 - 2].
    fn next(&mut self) -> i64 {
        let mut result = RAND_AMPLITUDE * (self.seed % RAND_Q) - RAND_R * (self.seed / RAND_Q);
        if result <= 0 {
            result += RAND_MAXIMUM;
        }
        self.seed = result;
        result
    }

    /// A value in [-1, 1) on a 1/256 grid.
    fn gradient_component(&mut self) -> f32 {
        let block = BLOCK_SIZE as i64;
        ((self.next() % (2 * block)) - block) as f32 / block as f32
    }
}

/// Lattice and gradients, built once per evaluation.
struct PaintingData {
    lattice: [usize; 2 * BLOCK_SIZE + 2],
    gradient: Box<[[[f32; 2]; 2 * BLOCK_SIZE + 2]; 4]>,
}

impl PaintingData {
    fn new(seed: f32) -> Self {
        let mut random = Random::new(seed);
        let mut lattice = [0usize; 2 * BLOCK_SIZE + 2];
        let mut gradient = Box::new([[[0.0f32; 2]; 2 * BLOCK_SIZE + 2]; 4]);

        for channel in gradient.iter_mut() {
            for (i, g) in channel.iter_mut().take(BLOCK_SIZE).enumerate() {
                lattice[i] = i;
                loop {
                    g[0] = random.gradient_component();
                    g[1] = random.gradient_component();
                    if g[0] != 0.0 || g[1] != 0.0 {
                        break;
                    }
                }
                let length = (g[0] * g[0] + g[1] * g[1]).sqrt();
                g[0] /= length;
                g[1] /= length;
            }
        }

        for i in (1..BLOCK_SIZE).rev() {
            let j = (random.next() % BLOCK_SIZE as i64) as usize;
            lattice.swap(i, j);
        }

        for i in 0..BLOCK_SIZE + 2 {
            lattice[BLOCK_SIZE + i] = lattice[i];
            for channel in gradient.iter_mut() {
                channel[BLOCK_SIZE + i] = channel[i];
            }
        }

        Self { lattice, gradient }
    }

    fn noise2d(&self, channel: usize, stitch: Option<&StitchState>, vector: FloatPoint) -> f32 {
        let split = |component: f32| {
            let position = component + PERLIN_NOISE as f32;
            let integer = position as i32;
            (integer, integer + 1, position - integer as f32)
        };
        let (mut bx0, mut bx1, rx) = split(vector.x);
        let (mut by0, mut by1, ry) = split(vector.y);

        // Corners past the tile's far edge wrap back to its near edge.
        if let Some(state) = stitch {
            for bx in [&mut bx0, &mut bx1] {
                if *bx >= state.wrap_x {
                    *bx -= state.width;
                }
            }
            for by in [&mut by0, &mut by1] {
                if *by >= state.wrap_y {
                    *by -= state.height;
                }
            }
        }
        let by0 = (by0 & BLOCK_MASK) as usize;
        let by1 = (by1 & BLOCK_MASK) as usize;

        let i = self.lattice[(bx0 & BLOCK_MASK) as usize];
        let j = self.lattice[(bx1 & BLOCK_MASK) as usize];
        let sx = smooth_curve(rx);
        let sy = smooth_curve(ry);
        let gradient = &self.gradient[channel];
        let dot = |index: usize, x: f32, y: f32| {
            let q = gradient[self.lattice[index]];
            x * q[0] + y * q[1]
        };

        let u = dot(i + by0, rx, ry);
        let v = dot(j + by0, rx - 1.0, ry);
        let a = lerp(sx, u, v);
        let u = dot(i + by1, rx, ry - 1.0);
        let v = dot(j + by1, rx - 1.0, ry - 1.0);
        let b = lerp(sx, u, v);
        lerp(sy, a, b)
    }
}

#[inline]
fn smooth_curve(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StitchState {
    width: i32,
    wrap_x: i32,
    height: i32,
    wrap_y: i32,
}

/// Base frequencies after stitch snapping, plus the first octave's wrap state.
#[derive(Debug, Clone, Copy)]
struct Stitch {
    frequency_x: f32,
    frequency_y: f32,
    state: Option<StitchState>,
}

impl Stitch {
    fn new(turbulence: &Turbulence, tile: FloatRect) -> Self {
        let mut frequency_x = turbulence.base_frequency_x;
        let mut frequency_y = turbulence.base_frequency_y;
        if !turbulence.stitch_tiles || tile.width <= 0.0 || tile.height <= 0.0 {
            return Self {
                frequency_x,
                frequency_y,
                state: None,
            };
        }
        frequency_x = stitch_frequency(frequency_x, tile.width);
        frequency_y = stitch_frequency(frequency_y, tile.height);
        let width = (tile.width * frequency_x).round() as i32;
        let height = (tile.height * frequency_y).round() as i32;
        // The wrap points sit one tile past the tile's own lattice origin.
        let wrap_x = (tile.x * frequency_x + PERLIN_NOISE as f32 + width as f32) as i32;
        let wrap_y = (tile.y * frequency_y + PERLIN_NOISE as f32 + height as f32) as i32;
        Self {
            frequency_x,
            frequency_y,
            state: Some(StitchState {
                width,
                wrap_x,
                height,
                wrap_y,
            }),
        }
    }
}

/// Snap `frequency` to whichever of its neighbours fits a whole number of
/// lattice cells into `tile` with the smaller ratio.
fn stitch_frequency(frequency: f32, tile: f32) -> f32 {
    if frequency == 0.0 {
        return frequency;
    }
    let low = (tile * frequency).floor() / tile;
    let high = (tile * frequency).ceil() / tile;
    if frequency / low < high / frequency {
        low
    } else {
        high
    }
}
