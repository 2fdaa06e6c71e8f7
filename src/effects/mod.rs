//! The effect kinds and their pixel kernels.
//!
//! Every node in a [`FilterGraph`](crate::graph::FilterGraph) carries one
//! [`EffectKind`]. The enum is closed: dispatch is an exhaustive `match`, and
//! each kind's parameters live in its own module next to its kernel.
//!
//! Kernels never fail. They receive an [`ApplyContext`] whose inputs have
//! already been converted to the node's operating color space and return a
//! buffer covering exactly the node's absolute paint rect.

pub mod blend;
pub mod color_matrix;
pub mod component_transfer;
pub mod composite;
pub mod convolve_matrix;
pub mod displacement_map;
pub mod drop_shadow;
pub mod flood;
pub mod gaussian_blur;
pub mod light_source;
pub mod lighting;
pub mod merge;
pub mod morphology;
pub mod offset;
pub mod source;
pub mod tile;
pub mod turbulence;

pub use blend::{Blend, BlendMode};
pub use color_matrix::{ColorMatrix, ColorMatrixType};
pub use component_transfer::{ComponentTransfer, TransferFunction, TransferFunctionType};
pub use composite::{Composite, CompositeMode};
pub use convolve_matrix::{ConvolveMatrix, EdgeMode};
pub use displacement_map::{ChannelSelector, DisplacementMap};
pub use drop_shadow::DropShadow;
pub use flood::Flood;
pub use gaussian_blur::GaussianBlur;
pub use light_source::LightSource;
pub use lighting::{DiffuseLighting, SpecularLighting};
pub use morphology::{Morphology, MorphologyOperator};
pub use offset::Offset;
pub use source::SourceImage;
pub use turbulence::{Turbulence, TurbulenceType};

use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::color_space::ColorSpace;
use crate::core::geometry::{FloatRect, IntRect};
use crate::core::parallel::ParallelSettings;
use crate::core::region::FilterRegion;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

// ============================================================================
// Kernel Inputs
// ============================================================================

/// One input result as seen by a kernel.
#[derive(Debug, Clone)]
pub struct EffectInput {
    /// The input's result, converted to the consumer's operating color space.
    pub image: PixelBuffer,
    /// Absolute rectangle `image` covers.
    pub paint_rect: IntRect,
    /// The input's max effect rect (absolute).
    pub max_effect_rect: FloatRect,
    /// True for SourceGraphic and SourceAlpha.
    pub is_source: bool,
}

impl EffectInput {
    /// Premultiplied copy of `region` (absolute), transparent where the input has no pixels.
    pub fn premultiplied_in(&self, region: &IntRect) -> PixelBuffer {
        self.image
            .as_premultiplied()
            .copy_region(self.paint_rect.location(), region)
    }

    /// Unmultiplied copy of `region` (absolute), transparent where the input has no pixels.
    pub fn unmultiplied_in(&self, region: &IntRect) -> PixelBuffer {
        self.image
            .as_unmultiplied()
            .copy_region(self.paint_rect.location(), region)
    }

    /// Where the input's top-left pixel lands in `region`'s pixel grid.
    pub fn offset_in(&self, region: &IntRect) -> (i32, i32) {
        (self.paint_rect.x - region.x, self.paint_rect.y - region.y)
    }
}

/// Everything a kernel may read while producing one node's result.
pub struct ApplyContext<'a> {
    /// Absolute rectangle the result must cover.
    pub paint_rect: IntRect,
    /// The node's max effect rect (absolute).
    pub max_effect_rect: FloatRect,
    /// The node's primitive subregion (local units).
    pub primitive_subregion: FloatRect,
    /// Filter region and scale.
    pub filter: &'a FilterRegion,
    /// Color space the kernel works in.
    pub operating_color_space: ColorSpace,
    /// True when only the alpha channel carries information.
    pub is_alpha_image: bool,
    /// Parallel split policy.
    pub parallel: &'a ParallelSettings,
    /// Input results, in input order.
    pub inputs: &'a [EffectInput],
    /// The bound source image, for the source leaves.
    pub source: Option<&'a SourceImage>,
}

impl<'a> ApplyContext<'a> {
    /// Input `index` as a premultiplied buffer covering the paint rect.
    pub fn input_premultiplied(&self, index: usize) -> PixelBuffer {
        match self.inputs.get(index) {
            Some(input) => input.premultiplied_in(&self.paint_rect),
            None => self.transparent(AlphaRepresentation::Premultiplied),
        }
    }

    /// Input `index` as an unmultiplied buffer covering the paint rect.
    pub fn input_unmultiplied(&self, index: usize) -> PixelBuffer {
        match self.inputs.get(index) {
            Some(input) => input.unmultiplied_in(&self.paint_rect),
            None => self.transparent(AlphaRepresentation::Unmultiplied),
        }
    }

    /// A transparent buffer covering the paint rect.
    pub fn transparent(&self, representation: AlphaRepresentation) -> PixelBuffer {
        PixelBuffer::for_rect(&self.paint_rect, representation)
    }
}

// ============================================================================
// Effect Kinds
// ============================================================================

/// How many inputs a kind takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputArity {
    /// Exactly this many.
    Exactly(usize),
    /// Any number, including none.
    Any,
}

impl InputArity {
    /// True when `count` inputs are acceptable.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            InputArity::Exactly(n) => n == count,
            InputArity::Any => true,
        }
    }

    /// Expected count for error messages.
    pub fn expected(self, got: usize) -> usize {
        match self {
            InputArity::Exactly(n) => n,
            InputArity::Any => got,
        }
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EffectKind {
    /// The bound source image.
    SourceGraphic,
    /// The alpha channel of the bound source image.
    SourceAlpha,
    /// Separable blend of two inputs.
    Blend(Blend),
    /// Porter-Duff or arithmetic compositing of two inputs.
    Composite(Composite),
    /// 4x5 color matrix.
    ColorMatrix(ColorMatrix),
    /// Per-channel transfer tables.
    ComponentTransfer(ComponentTransfer),
    /// General convolution.
    ConvolveMatrix(ConvolveMatrix),
    /// Erode or dilate.
    Morphology(Morphology),
    /// Three-pass box blur.
    GaussianBlur(GaussianBlur),
    /// Lambertian lighting of the alpha surface.
    DiffuseLighting(DiffuseLighting),
    /// Phong specular lighting of the alpha surface.
    SpecularLighting(SpecularLighting),
    /// Perlin noise.
    Turbulence(Turbulence),
    /// Displace one input by the channels of another.
    DisplacementMap(DisplacementMap),
    /// Repeat the input's tile over the subregion.
    Tile,
    /// Stack inputs with source-over.
    Merge,
    /// Solid color.
    Flood(Flood),
    /// Translate.
    Offset(Offset),
    /// Blurred, recolored, offset copy under the input.
    DropShadow(DropShadow),
}

impl EffectKind {
    /// Names of every kind, in declaration order.
    pub const ALL_NAMES: [&'static str; 18] = [
        "SourceGraphic",
        "SourceAlpha",
        "feBlend",
        "feComposite",
        "feColorMatrix",
        "feComponentTransfer",
        "feConvolveMatrix",
        "feMorphology",
        "feGaussianBlur",
        "feDiffuseLighting",
        "feSpecularLighting",
        "feTurbulence",
        "feDisplacementMap",
        "feTile",
        "feMerge",
        "feFlood",
        "feOffset",
        "feDropShadow",
    ];

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        let index = match self {
            EffectKind::SourceGraphic => 0,
            EffectKind::SourceAlpha => 1,
            EffectKind::Blend(_) => 2,
            EffectKind::Composite(_) => 3,
            EffectKind::ColorMatrix(_) => 4,
            EffectKind::ComponentTransfer(_) => 5,
            EffectKind::ConvolveMatrix(_) => 6,
            EffectKind::Morphology(_) => 7,
            EffectKind::GaussianBlur(_) => 8,
            EffectKind::DiffuseLighting(_) => 9,
            EffectKind::SpecularLighting(_) => 10,
            EffectKind::Turbulence(_) => 11,
            EffectKind::DisplacementMap(_) => 12,
            EffectKind::Tile => 13,
            EffectKind::Merge => 14,
            EffectKind::Flood(_) => 15,
            EffectKind::Offset(_) => 16,
            EffectKind::DropShadow(_) => 17,
        };
        Self::ALL_NAMES[index]
    }

    /// True for SourceGraphic and SourceAlpha.
    pub fn is_source(&self) -> bool {
        matches!(self, EffectKind::SourceGraphic | EffectKind::SourceAlpha)
    }

    /// Number of inputs this kind consumes.
    pub fn input_arity(&self) -> InputArity {
        match self {
            EffectKind::SourceGraphic
            | EffectKind::SourceAlpha
            | EffectKind::Turbulence(_)
            | EffectKind::Flood(_) => InputArity::Exactly(0),
            EffectKind::Blend(_) | EffectKind::Composite(_) | EffectKind::DisplacementMap(_) => {
                InputArity::Exactly(2)
            }
            EffectKind::Merge => InputArity::Any,
            _ => InputArity::Exactly(1),
        }
    }

    /// Color space a freshly added node of this kind works in.
    pub fn default_operating_color_space(&self) -> ColorSpace {
        if self.is_source() {
            ColorSpace::DeviceRgb
        } else {
            ColorSpace::LinearRgb
        }
    }

    /// True when the kind can paint where every input is transparent.
    pub fn affects_transparent_pixels(&self) -> bool {
        match self {
            EffectKind::ColorMatrix(m) => m.affects_transparent_pixels(),
            EffectKind::ComponentTransfer(t) => t.affects_transparent_pixels(),
            EffectKind::Composite(c) => c.affects_transparent_pixels(),
            _ => false,
        }
    }

    /// Whether input `index` is converted to the operating color space before use.
    pub fn transforms_input_color_space(&self, index: usize) -> bool {
        !matches!(self, EffectKind::DisplacementMap(_) if index == 1)
    }

    /// False only for kinds that tolerate color channels above alpha in their inputs.
    pub fn requires_valid_premultiplied_pixels(&self) -> bool {
        !self.may_produce_invalid_premultiplied_pixels()
    }

    /// True when the result may hold color channels above alpha.
    pub fn may_produce_invalid_premultiplied_pixels(&self) -> bool {
        matches!(self, EffectKind::Composite(c) if c.operator == CompositeMode::Arithmetic)
    }

    /// Map an absolute rectangle through the kind's geometry.
    ///
    /// `forward` maps input space to output space; backward answers which input
    /// region a given output region needs. Tile is handled by the propagator
    /// because it depends on node rectangles rather than parameters.
    pub fn map_paint_rect(&self, rect: FloatRect, forward: bool, filter: &FilterRegion) -> FloatRect {
        match self {
            EffectKind::GaussianBlur(b) => b.map_paint_rect(rect, filter),
            EffectKind::DropShadow(s) => s.map_paint_rect(rect, forward, filter),
            EffectKind::Offset(o) => o.map_paint_rect(rect, forward, filter),
            EffectKind::Morphology(m) => m.map_paint_rect(rect, filter),
            EffectKind::ConvolveMatrix(c) => c.map_paint_rect(rect, forward),
            EffectKind::DisplacementMap(d) => d.map_paint_rect(rect, filter),
            EffectKind::DiffuseLighting(_) | EffectKind::SpecularLighting(_) => {
                lighting::map_paint_rect(rect)
            }
            _ => rect,
        }
    }

    /// Parameter problems that must keep the node away from its kernel.
    pub fn parameter_errors(&self) -> Vec<(String, String)> {
        match self {
            EffectKind::ConvolveMatrix(c) => c.parameter_errors(),
            EffectKind::GaussianBlur(b) => b.parameter_errors(),
            EffectKind::DropShadow(s) => s.parameter_errors(),
            EffectKind::Turbulence(t) => t.parameter_errors(),
            EffectKind::SpecularLighting(s) => s.parameter_errors(),
            EffectKind::DiffuseLighting(d) => d.parameter_errors(),
            _ => Vec::new(),
        }
    }

    /// Run the kernel.
    pub fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        match self {
            EffectKind::SourceGraphic => source::apply_source_graphic(ctx),
            EffectKind::SourceAlpha => source::apply_source_alpha(ctx),
            EffectKind::Blend(b) => b.apply(ctx),
            EffectKind::Composite(c) => c.apply(ctx),
            EffectKind::ColorMatrix(m) => m.apply(ctx),
            EffectKind::ComponentTransfer(t) => t.apply(ctx),
            EffectKind::ConvolveMatrix(c) => c.apply(ctx),
            EffectKind::Morphology(m) => m.apply(ctx),
            EffectKind::GaussianBlur(b) => b.apply(ctx),
            EffectKind::DiffuseLighting(d) => d.apply(ctx),
            EffectKind::SpecularLighting(s) => s.apply(ctx),
            EffectKind::Turbulence(t) => t.apply(ctx),
            EffectKind::DisplacementMap(d) => d.apply(ctx),
            EffectKind::Tile => tile::apply(ctx),
            EffectKind::Merge => merge::apply(ctx),
            EffectKind::Flood(f) => f.apply(ctx),
            EffectKind::Offset(o) => o.apply(ctx),
            EffectKind::DropShadow(s) => s.apply(ctx),
        }
    }

    /// Append ` key="value"` pairs describing the parameters.
    pub fn write_parameters(&self, out: &mut String) {
        // Writing into a String cannot fail.
        let _ = match self {
            EffectKind::SourceGraphic
            | EffectKind::SourceAlpha
            | EffectKind::Tile
            | EffectKind::Merge => Ok(()),
            EffectKind::Blend(b) => write!(out, " mode=\"{}\"", b.mode.name()),
            EffectKind::Composite(c) => c.write_parameters(out),
            EffectKind::ColorMatrix(m) => m.write_parameters(out),
            EffectKind::ComponentTransfer(t) => t.write_parameters(out),
            EffectKind::ConvolveMatrix(c) => c.write_parameters(out),
            EffectKind::Morphology(m) => write!(
                out,
                " operator=\"{}\" radius=\"{}, {}\"",
                m.operator.name(),
                m.radius_x,
                m.radius_y
            ),
            EffectKind::GaussianBlur(b) => write!(
                out,
                " stdDeviation=\"{}, {}\"",
                b.std_deviation_x, b.std_deviation_y
            ),
            EffectKind::DiffuseLighting(d) => d.write_parameters(out),
            EffectKind::SpecularLighting(s) => s.write_parameters(out),
            EffectKind::Turbulence(t) => t.write_parameters(out),
            EffectKind::DisplacementMap(d) => write!(
                out,
                " scale=\"{}\" xChannelSelector=\"{}\" yChannelSelector=\"{}\"",
                d.scale,
                d.x_channel.name(),
                d.y_channel.name()
            ),
            EffectKind::Flood(f) => write!(
                out,
                " flood-color=\"{}\" flood-opacity=\"{}\"",
                flood::color_name(f.flood_color),
                f.flood_opacity
            ),
            EffectKind::Offset(o) => write!(out, " dx=\"{}\" dy=\"{}\"", o.dx, o.dy),
            EffectKind::DropShadow(s) => write!(
                out,
                " stdDeviation=\"{}, {}\" dx=\"{}\" dy=\"{}\" flood-color=\"{}\" flood-opacity=\"{}\"",
                s.std_deviation_x,
                s.std_deviation_y,
                s.dx,
                s.dy,
                flood::color_name(s.shadow_color),
                s.shadow_opacity
            ),
        };
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_line_up() {
        assert_eq!(EffectKind::SourceGraphic.name(), "SourceGraphic");
        assert_eq!(EffectKind::Tile.name(), "feTile");
        assert_eq!(EffectKind::Offset(Offset::new(1.0, 2.0)).name(), "feOffset");
        assert_eq!(EffectKind::DropShadow(DropShadow::default()).name(), "feDropShadow");
    }

    #[test]
    fn test_arity() {
        assert_eq!(EffectKind::Merge.input_arity(), InputArity::Any);
        assert_eq!(EffectKind::Blend(Blend::default()).input_arity(), InputArity::Exactly(2));
        assert_eq!(EffectKind::Flood(Flood::default()).input_arity(), InputArity::Exactly(0));
        assert!(EffectKind::Tile.input_arity().accepts(1));
        assert!(!EffectKind::Tile.input_arity().accepts(2));
    }

    #[test]
    fn test_displacement_map_keeps_map_color_space() {
        let kind = EffectKind::DisplacementMap(DisplacementMap::default());
        assert!(kind.transforms_input_color_space(0));
        assert!(!kind.transforms_input_color_space(1));
    }

    #[test]
    fn test_only_arithmetic_composite_skips_validation() {
        let arithmetic = EffectKind::Composite(Composite::arithmetic(0.0, 1.0, 0.0, 0.0));
        let over = EffectKind::Composite(Composite::new(CompositeMode::Over));
        assert!(!arithmetic.requires_valid_premultiplied_pixels());
        assert!(arithmetic.may_produce_invalid_premultiplied_pixels());
        assert!(over.requires_valid_premultiplied_pixels());
    }

    #[test]
    fn test_serde_tagging() {
        let kind = EffectKind::GaussianBlur(GaussianBlur::new(2.0, 3.0));
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"type\":\"GaussianBlur\""));
        let back: EffectKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);

        let tile: EffectKind = serde_json::from_str(r#"{"type":"Tile"}"#).unwrap();
        assert_eq!(tile, EffectKind::Tile);
    }
}
