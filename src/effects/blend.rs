//! Blend: separable blend modes on premultiplied pixels.

use super::ApplyContext;
use crate::core::buffer::{div255, AlphaRepresentation, PixelBuffer};
use serde::{Deserialize, Serialize};

/// Blend mode of `in` (A) over `in2` (B).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Unrecognized mode. Produces transparent black.
    Unknown,
    /// A over B.
    #[default]
    Normal,
    /// Product.
    Multiply,
    /// Inverse product.
    Screen,
    /// Per channel minimum.
    Darken,
    /// Per channel maximum.
    Lighten,
}

impl BlendMode {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Unknown => "unknown",
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
        }
    }
}

/// Blend parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blend {
    /// Mode.
    pub mode: BlendMode,
}

impl Blend {
    /// Blend with `mode`.
    pub fn new(mode: BlendMode) -> Self {
        Self { mode }
    }

    /// Returns true when the value changed.
    pub fn set_mode(&mut self, mode: BlendMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        true
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let a = ctx.input_premultiplied(0);
        let b = ctx.input_premultiplied(1);
        let mut out = ctx.transparent(AlphaRepresentation::Premultiplied);
        for ((dst, pa), pb) in out
            .data_mut()
            .chunks_exact_mut(4)
            .zip(a.data().chunks_exact(4))
            .zip(b.data().chunks_exact(4))
        {
            let pa = [pa[0], pa[1], pa[2], pa[3]];
            let pb = [pb[0], pb[1], pb[2], pb[3]];
            dst.copy_from_slice(&blend_pixel(self.mode, pa, pb));
        }
        out
    }
}

/// Blend one premultiplied pixel pair.
pub fn blend_pixel(mode: BlendMode, a: [u8; 4], b: [u8; 4]) -> [u8; 4] {
    if mode == BlendMode::Unknown {
        return [0; 4];
    }
    let alpha_a = a[3] as u32;
    let alpha_b = b[3] as u32;
    let mut out = [0u8; 4];
    for c in 0..3 {
        let ca = a[c] as u32;
        let cb = b[c] as u32;
        let value = match mode {
            BlendMode::Normal => div255((255 - alpha_a) * cb) + ca,
            BlendMode::Multiply => div255((255 - alpha_a) * cb + (255 - alpha_b + cb) * ca),
            BlendMode::Screen => div255((cb + ca) * 255 - ca * cb),
            BlendMode::Darken => {
                (div255((255 - alpha_a) * cb) + ca).min(div255((255 - alpha_b) * ca) + cb)
            }
            BlendMode::Lighten => {
                (div255((255 - alpha_a) * cb) + ca).max(div255((255 - alpha_b) * ca) + cb)
            }
            BlendMode::Unknown => 0,
        };
        out[c] = value.min(255) as u8;
    }
    out[3] = union_alpha(a[3], b[3]);
    out
}

/// `255 - (255 - αA)(255 - αB)/255`, rounded.
pub fn union_alpha(alpha_a: u8, alpha_b: u8) -> u8 {
    let inv = (255 - alpha_a as u32) * (255 - alpha_b as u32);
    div255(255 * 255 - inv) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MODES: [BlendMode; 5] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Darken,
        BlendMode::Lighten,
    ];

    #[test]
    fn test_normal_is_source_over() {
        let a = [0, 0, 128, 128];
        let b = [255, 0, 0, 255];
        assert_eq!(blend_pixel(BlendMode::Normal, a, b), [127, 0, 128, 255]);
    }

    #[test]
    fn test_multiply_opaque() {
        let a = [255, 128, 0, 255];
        let b = [128, 128, 128, 255];
        assert_eq!(blend_pixel(BlendMode::Multiply, a, b), [128, 64, 0, 255]);
    }

    #[test]
    fn test_screen_with_black_is_identity() {
        let a = [10, 20, 30, 255];
        let black = [0, 0, 0, 255];
        assert_eq!(blend_pixel(BlendMode::Screen, a, black), a);
    }

    #[test]
    fn test_darken_and_lighten() {
        let a = [200, 50, 100, 255];
        let b = [100, 150, 100, 255];
        assert_eq!(blend_pixel(BlendMode::Darken, a, b), [100, 50, 100, 255]);
        assert_eq!(blend_pixel(BlendMode::Lighten, a, b), [200, 150, 100, 255]);
    }

    #[test]
    fn test_unknown_mode_is_transparent() {
        assert_eq!(blend_pixel(BlendMode::Unknown, [9; 4], [200; 4]), [0; 4]);
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&Blend::new(BlendMode::Multiply)).unwrap();
        assert_eq!(json, r#"{"mode":"multiply"}"#);
        let blend: Blend = serde_json::from_str("{}").unwrap();
        assert_eq!(blend.mode, BlendMode::Normal);
    }

    fn premultiplied_pixel() -> impl Strategy<Value = [u8; 4]> {
        (0u8..=255).prop_flat_map(|alpha| {
            (0..=alpha, 0..=alpha, 0..=alpha).prop_map(move |(r, g, b)| [r, g, b, alpha])
        })
    }

    proptest! {
        #[test]
        fn blend_alpha_is_union(a in premultiplied_pixel(), b in premultiplied_pixel(), mode in 0usize..5) {
            let out = blend_pixel(MODES[mode], a, b);
            let expected = (255.0 - (255.0 - a[3] as f64) * (255.0 - b[3] as f64) / 255.0).round() as u8;
            prop_assert_eq!(out[3], expected);
        }

        #[test]
        fn blend_never_exceeds_union_alpha_by_more_than_rounding(a in premultiplied_pixel(), b in premultiplied_pixel(), mode in 0usize..5) {
            let out = blend_pixel(MODES[mode], a, b);
            for c in 0..3 {
                prop_assert!(out[c] as u32 <= out[3] as u32 + 1);
            }
        }
    }
}
