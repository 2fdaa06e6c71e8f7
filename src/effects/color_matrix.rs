//! ColorMatrix: a 4x5 matrix over unmultiplied RGBA.

use super::ApplyContext;
use crate::core::buffer::PixelBuffer;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Which preset the `values` describe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorMatrixType {
    /// Twenty raw coefficients, row major.
    #[default]
    Matrix,
    /// One saturation value.
    Saturate,
    /// One angle in degrees.
    HueRotate,
    /// No values.
    LuminanceToAlpha,
}

impl ColorMatrixType {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            ColorMatrixType::Matrix => "matrix",
            ColorMatrixType::Saturate => "saturate",
            ColorMatrixType::HueRotate => "hueRotate",
            ColorMatrixType::LuminanceToAlpha => "luminanceToAlpha",
        }
    }
}

/// ColorMatrix parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorMatrix {
    /// Preset.
    pub matrix_type: ColorMatrixType,
    /// Preset arguments.
    pub values: Vec<f32>,
}

const IDENTITY: [f32; 20] = [
    1.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

impl ColorMatrix {
    /// A matrix of the given type.
    pub fn new(matrix_type: ColorMatrixType, values: Vec<f32>) -> Self {
        Self {
            matrix_type,
            values,
        }
    }

    /// Saturate preset.
    pub fn saturate(s: f32) -> Self {
        Self::new(ColorMatrixType::Saturate, vec![s])
    }

    /// HueRotate preset.
    pub fn hue_rotate(degrees: f32) -> Self {
        Self::new(ColorMatrixType::HueRotate, vec![degrees])
    }

    /// Returns true when the value changed.
    pub fn set_type(&mut self, matrix_type: ColorMatrixType) -> bool {
        if self.matrix_type == matrix_type {
            return false;
        }
        self.matrix_type = matrix_type;
        true
    }

    /// Returns true when the value changed.
    pub fn set_values(&mut self, values: Vec<f32>) -> bool {
        if self.values == values {
            return false;
        }
        self.values = values;
        true
    }

    pub(crate) fn affects_transparent_pixels(&self) -> bool {
        self.matrix_type == ColorMatrixType::Matrix
            && self.values.len() == 20
            && self.values[19] > 0.0
    }

    /// The effective 4x5 matrix, constant column in byte units.
    pub fn coefficients(&self) -> [f32; 20] {
        match self.matrix_type {
            ColorMatrixType::Matrix => {
                let mut m = IDENTITY;
                if self.values.len() == 20 {
                    m.copy_from_slice(&self.values);
                }
                for row in 0..4 {
                    m[row * 5 + 4] *= 255.0;
                }
                m
            }
            ColorMatrixType::Saturate => {
                saturate_matrix(self.values.first().copied().unwrap_or(1.0))
            }
            ColorMatrixType::HueRotate => {
                hue_rotate_matrix(self.values.first().copied().unwrap_or(0.0))
            }
            ColorMatrixType::LuminanceToAlpha => {
                let mut m = [0.0; 20];
                m[15] = 0.2125;
                m[16] = 0.7154;
                m[17] = 0.0721;
                m
            }
        }
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let mut out = ctx.input_unmultiplied(0);
        let m = self.coefficients();
        for pixel in out.data_mut().chunks_exact_mut(4) {
            let r = pixel[0] as f32;
            let g = pixel[1] as f32;
            let b = pixel[2] as f32;
            let a = pixel[3] as f32;
            for (row, channel) in pixel.iter_mut().enumerate() {
                let k = &m[row * 5..row * 5 + 5];
                let value = k[0] * r + k[1] * g + k[2] * b + k[3] * a + k[4];
                *channel = value.round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }

    pub(crate) fn write_parameters(&self, out: &mut String) -> fmt::Result {
        write!(out, " type=\"{}\"", self.matrix_type.name())?;
        if !self.values.is_empty() {
            out.push_str(" values=\"");
            for (i, v) in self.values.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write!(out, "{v}")?;
            }
            out.push('"');
        }
        Ok(())
    }
}

fn saturate_matrix(s: f32) -> [f32; 20] {
    [
        0.213 + 0.787 * s,
        0.715 - 0.715 * s,
        0.072 - 0.072 * s,
        0.0,
        0.0,
        0.213 - 0.213 * s,
        0.715 + 0.285 * s,
        0.072 - 0.072 * s,
        0.0,
        0.0,
        0.213 - 0.213 * s,
        0.715 - 0.715 * s,
        0.072 + 0.928 * s,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
    ]
}

fn hue_rotate_matrix(degrees: f32) -> [f32; 20] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        0.213 + cos * 0.787 - sin * 0.213,
        0.715 - cos * 0.715 - sin * 0.715,
        0.072 - cos * 0.072 + sin * 0.928,
        0.0,
        0.0,
        0.213 - cos * 0.213 + sin * 0.143,
        0.715 + cos * 0.285 + sin * 0.140,
        0.072 - cos * 0.072 - sin * 0.283,
        0.0,
        0.0,
        0.213 - cos * 0.213 - sin * 0.787,
        0.715 - cos * 0.715 + sin * 0.715,
        0.072 + cos * 0.928 + sin * 0.072,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::AlphaRepresentation;
    use crate::core::color_space::ColorSpace;
    use crate::core::geometry::{FloatRect, IntRect};
    use crate::core::parallel::ParallelSettings;
    use crate::core::region::FilterRegion;
    use crate::effects::EffectInput;

    fn run(matrix: &ColorMatrix, pixel: [u8; 4], representation: AlphaRepresentation) -> [u8; 4] {
        let rect = IntRect::new(0, 0, 1, 1);
        let mut image = PixelBuffer::for_rect(&rect, representation);
        image.fill(pixel);
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
        matrix.apply(&ctx).pixel(0, 0)
    }

    #[test]
    fn test_saturate_zero_is_luminance_grey() {
        let out = run(
            &ColorMatrix::saturate(0.0),
            [100, 150, 200, 255],
            AlphaRepresentation::Premultiplied,
        );
        assert_eq!(out, [143, 143, 143, 255]);
    }

    #[test]
    fn test_saturate_one_is_identity() {
        let out = run(&ColorMatrix::saturate(1.0), [12, 34, 56, 255], AlphaRepresentation::Unmultiplied);
        assert_eq!(out, [12, 34, 56, 255]);
    }

    #[test]
    fn test_hue_rotate_zero_is_identity() {
        let out = run(&ColorMatrix::hue_rotate(0.0), [90, 10, 240, 255], AlphaRepresentation::Unmultiplied);
        assert_eq!(out, [90, 10, 240, 255]);
    }

    #[test]
    fn test_luminance_to_alpha() {
        let m = ColorMatrix::new(ColorMatrixType::LuminanceToAlpha, Vec::new());
        let out = run(&m, [255, 255, 255, 10], AlphaRepresentation::Unmultiplied);
        assert_eq!(out, [0, 0, 0, 255]);
    }

    #[test]
    fn test_matrix_constant_column_is_scaled() {
        let mut values = IDENTITY.to_vec();
        values[4] = 0.5;
        values[19] = 1.0;
        let m = ColorMatrix::new(ColorMatrixType::Matrix, values);
        assert!(m.affects_transparent_pixels());
        let out = run(&m, [0, 0, 0, 0], AlphaRepresentation::Unmultiplied);
        assert_eq!(out, [128, 0, 0, 255]);
    }

    #[test]
    fn test_bad_matrix_length_is_identity() {
        let m = ColorMatrix::new(ColorMatrixType::Matrix, vec![0.0; 3]);
        assert!(!m.affects_transparent_pixels());
        assert_eq!(m.coefficients(), IDENTITY);
    }
}
