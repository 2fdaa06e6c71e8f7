//! Flood: fill the paint rect with one color.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::color_space::{conversion_table, ColorSpace};
use crate::core::geometry::Color;
use serde::{Deserialize, Serialize};

/// Flood parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flood {
    /// Device RGB color.
    pub flood_color: Color,
    /// Multiplies the color's alpha.
    pub flood_opacity: f32,
}

impl Default for Flood {
    fn default() -> Self {
        Self {
            flood_color: Color::BLACK,
            flood_opacity: 1.0,
        }
    }
}

impl Flood {
    /// Flood with `color` at `opacity`.
    pub fn new(color: Color, opacity: f32) -> Self {
        Self {
            flood_color: color,
            flood_opacity: opacity,
        }
    }

    /// Returns true when the value changed.
    pub fn set_flood_color(&mut self, color: Color) -> bool {
        if self.flood_color == color {
            return false;
        }
        self.flood_color = color;
        true
    }

    /// Returns true when the value changed.
    pub fn set_flood_opacity(&mut self, opacity: f32) -> bool {
        if self.flood_opacity == opacity {
            return false;
        }
        self.flood_opacity = opacity;
        true
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let color = color_in_space(self.flood_color, ctx.operating_color_space)
            .with_alpha_multiplied_by(self.flood_opacity);
        let mut out = ctx.transparent(AlphaRepresentation::Premultiplied);
        out.fill(color.premultiplied());
        out
    }
}

/// A device RGB color expressed in `space`. Alpha is untouched.
pub fn color_in_space(color: Color, space: ColorSpace) -> Color {
    match conversion_table(ColorSpace::DeviceRgb, space) {
        Some(table) => Color::rgba(
            table[color.r as usize],
            table[color.g as usize],
            table[color.b as usize],
            color.a,
        ),
        None => color,
    }
}

/// `#rrggbb`, or `#rrggbbaa` for translucent colors.
pub fn color_name(color: Color) -> String {
    if color.a == 255 {
        format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", color.r, color.g, color.b, color.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{FloatRect, IntRect};
    use crate::core::parallel::ParallelSettings;
    use crate::core::region::FilterRegion;

    fn flood(f: &Flood, space: ColorSpace) -> PixelBuffer {
        let filter = FilterRegion::default();
        let parallel = ParallelSettings::serial();
        let rect = IntRect::new(0, 0, 2, 2);
        let ctx = ApplyContext {
            paint_rect: rect,
            max_effect_rect: FloatRect::from(rect),
            primitive_subregion: FloatRect::from(rect),
            filter: &filter,
            operating_color_space: space,
            is_alpha_image: false,
            parallel: &parallel,
            inputs: &[],
            source: None,
        };
        f.apply(&ctx)
    }

    #[test]
    fn test_flood_opacity() {
        let out = flood(&Flood::new(Color::rgba(255, 0, 0, 255), 0.5), ColorSpace::DeviceRgb);
        assert_eq!(out.pixel(1, 1), [128, 0, 0, 128]);
    }

    #[test]
    fn test_flood_color_is_linearized() {
        let out = flood(&Flood::new(Color::rgba(128, 255, 0, 255), 1.0), ColorSpace::LinearRgb);
        assert_eq!(out.pixel(0, 0), [55, 255, 0, 255]);
    }

    #[test]
    fn test_setters_report_change() {
        let mut f = Flood::default();
        assert!(!f.set_flood_opacity(1.0));
        assert!(f.set_flood_opacity(0.25));
        assert!(f.set_flood_color(Color::TRANSPARENT));
    }

    #[test]
    fn test_color_name() {
        assert_eq!(color_name(Color::rgba(255, 0, 16, 255)), "#ff0010");
        assert_eq!(color_name(Color::rgba(0, 0, 0, 128)), "#00000080");
    }
}
