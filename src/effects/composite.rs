//! Composite: Porter-Duff operators and the arithmetic combination.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::draw::{composite_buffers, CompositeOperator};
use crate::core::geometry::FloatRect;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Compositing operator, `in` (A) onto `in2` (B).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    /// `A + B(1 - αA)`
    #[default]
    Over,
    /// `A·αB`
    In,
    /// `A(1 - αB)`
    Out,
    /// `A·αB + B(1 - αA)`
    Atop,
    /// `A(1 - αB) + B(1 - αA)`
    Xor,
    /// `k1·A·B + k2·A + k3·B + k4`
    Arithmetic,
}

impl CompositeMode {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            CompositeMode::Over => "over",
            CompositeMode::In => "in",
            CompositeMode::Out => "out",
            CompositeMode::Atop => "atop",
            CompositeMode::Xor => "xor",
            CompositeMode::Arithmetic => "arithmetic",
        }
    }

    fn draw_operator(self) -> CompositeOperator {
        match self {
            CompositeMode::In => CompositeOperator::SourceIn,
            CompositeMode::Out => CompositeOperator::SourceOut,
            CompositeMode::Atop => CompositeOperator::SourceAtop,
            CompositeMode::Xor => CompositeOperator::Xor,
            CompositeMode::Over | CompositeMode::Arithmetic => CompositeOperator::SourceOver,
        }
    }
}

/// Composite parameters. The `k` coefficients only matter for [`CompositeMode::Arithmetic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Composite {
    /// Operator.
    pub operator: CompositeMode,
    /// Coefficient of `A·B`.
    pub k1: f32,
    /// Coefficient of `A`.
    pub k2: f32,
    /// Coefficient of `B`.
    pub k3: f32,
    /// Constant term.
    pub k4: f32,
}

impl Composite {
    /// A Porter-Duff composite.
    pub fn new(operator: CompositeMode) -> Self {
        Self {
            operator,
            ..Self::default()
        }
    }

    /// An arithmetic composite.
    pub fn arithmetic(k1: f32, k2: f32, k3: f32, k4: f32) -> Self {
        Self {
            operator: CompositeMode::Arithmetic,
            k1,
            k2,
            k3,
            k4,
        }
    }

    /// Returns true when the value changed.
    pub fn set_operator(&mut self, operator: CompositeMode) -> bool {
        if self.operator == operator {
            return false;
        }
        self.operator = operator;
        true
    }

    /// Set all four coefficients. Returns true when any changed.
    pub fn set_coefficients(&mut self, k1: f32, k2: f32, k3: f32, k4: f32) -> bool {
        if (self.k1, self.k2, self.k3, self.k4) == (k1, k2, k3, k4) {
            return false;
        }
        self.k1 = k1;
        self.k2 = k2;
        self.k3 = k3;
        self.k4 = k4;
        true
    }

    pub(crate) fn affects_transparent_pixels(&self) -> bool {
        self.operator == CompositeMode::Arithmetic && self.k4 > 0.0
    }

    /// The paint rect this node needs given what its inputs produce.
    ///
    /// `a` and `b` are the absolute paint rects of `in` and `in2`; `request`
    /// is the (already clipped) rectangle asked of this node.
    pub fn combine_input_rects(&self, a: FloatRect, b: FloatRect, request: FloatRect) -> FloatRect {
        match self.operator {
            CompositeMode::In => a.intersection(&b),
            CompositeMode::Atop => b,
            CompositeMode::Arithmetic => {
                if self.k4 > 0.0 {
                    request
                } else if self.k2 <= 0.0 {
                    if self.k3 > 0.0 {
                        b
                    } else {
                        a.intersection(&b)
                    }
                } else {
                    a.union(&b)
                }
            }
            CompositeMode::Over | CompositeMode::Out | CompositeMode::Xor => a.union(&b),
        }
    }

    /// True when `in` only matters where `in2` paints, so `in` is asked for
    /// `in2`'s rect instead of the full request.
    pub fn clips_first_input_to_second(&self) -> bool {
        match self.operator {
            CompositeMode::In | CompositeMode::Atop => true,
            CompositeMode::Arithmetic => self.k4 <= 0.0 && self.k2 <= 0.0,
            CompositeMode::Over | CompositeMode::Out | CompositeMode::Xor => false,
        }
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let a = ctx.input_premultiplied(0);
        let b = ctx.input_premultiplied(1);
        if self.operator != CompositeMode::Arithmetic {
            return composite_buffers(&a, &b, self.operator.draw_operator());
        }

        let mut out = b.with_representation(AlphaRepresentation::Premultiplied);
        arithmetic(a.data(), out.data_mut(), self.k1, self.k2, self.k3, self.k4);
        out
    }

    pub(crate) fn write_parameters(&self, out: &mut String) -> fmt::Result {
        write!(out, " operation=\"{}\"", self.operator.name())?;
        if self.operator == CompositeMode::Arithmetic {
            write!(
                out,
                " k1=\"{}\" k2=\"{}\" k3=\"{}\" k4=\"{}\"",
                self.k1, self.k2, self.k3, self.k4
            )?;
        }
        Ok(())
    }
}

/// True when every result is provably within [0, 1] for inputs in [0, 1].
///
/// Each term is bounded by its coefficient's positive (or negative) part, so
/// `lower <= result <= upper` over the unit box.
pub fn arithmetic_needs_no_clamp(k1: f32, k2: f32, k3: f32, k4: f32) -> bool {
    let upper = k1.max(0.0) + k2.max(0.0) + k3.max(0.0) + k4;
    let lower = k1.min(0.0) + k2.min(0.0) + k3.min(0.0) + k4;
    let unit = 0.0..=1.0;
    unit.contains(&k4) && unit.contains(&upper) && unit.contains(&lower)
}

/// `k1·i1·i2/255 + k2·i1 + k3·i2 + 255·k4` on every byte, source `i1`, destination `i2`.
pub fn arithmetic(source: &[u8], destination: &mut [u8], k1: f32, k2: f32, k3: f32, k4: f32) {
    let scaled_k1 = k1 / 255.0;
    let scaled_k4 = k4 * 255.0;
    let combine = |i1: u8, i2: u8| {
        let i1 = i1 as f32;
        let i2 = i2 as f32;
        scaled_k1 * i1 * i2 + k2 * i1 + k3 * i2 + scaled_k4
    };

    if arithmetic_needs_no_clamp(k1, k2, k3, k4) {
        for (dst, &src) in destination.iter_mut().zip(source) {
            *dst = combine(src, *dst) as u8;
        }
    } else {
        for (dst, &src) in destination.iter_mut().zip(source) {
            *dst = combine(src, *dst).clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_identity_on_a() {
        let a = [10u8, 200, 3, 255, 0, 0, 0, 0];
        let mut b = [99u8, 1, 250, 128, 40, 40, 40, 40];
        arithmetic(&a, &mut b, 0.0, 1.0, 0.0, 0.0);
        assert_eq!(b, a);
    }

    #[test]
    fn test_arithmetic_clamps() {
        let a = [200u8; 4];
        let mut b = [200u8; 4];
        arithmetic(&a, &mut b, 0.0, 1.0, 1.0, 0.0);
        assert_eq!(b, [255; 4]);

        let mut c = [10u8; 4];
        arithmetic(&a, &mut c, 0.0, -1.0, 0.0, 0.0);
        assert_eq!(c, [0; 4]);
    }

    #[test]
    fn test_arithmetic_constant_term() {
        let a = [0u8; 4];
        let mut b = [0u8; 4];
        arithmetic(&a, &mut b, 0.0, 0.0, 0.0, 0.5);
        assert_eq!(b, [127; 4]);
    }

    #[test]
    fn test_no_clamp_bound() {
        assert!(arithmetic_needs_no_clamp(0.0, 1.0, 0.0, 0.0));
        assert!(arithmetic_needs_no_clamp(0.5, 0.25, 0.25, 0.0));
        assert!(!arithmetic_needs_no_clamp(0.0, 1.0, 1.0, 0.0));
        assert!(!arithmetic_needs_no_clamp(0.0, -0.5, 0.0, 0.25));
        assert!(!arithmetic_needs_no_clamp(0.0, 0.0, 0.0, 1.5));
    }

    #[test]
    fn test_combine_input_rects() {
        let a = FloatRect::new(0.0, 0.0, 10.0, 10.0);
        let b = FloatRect::new(5.0, 5.0, 10.0, 10.0);
        let request = FloatRect::new(-5.0, -5.0, 30.0, 30.0);

        let over = Composite::new(CompositeMode::Over);
        assert_eq!(over.combine_input_rects(a, b, request), FloatRect::new(0.0, 0.0, 15.0, 15.0));
        let inside = Composite::new(CompositeMode::In);
        assert_eq!(inside.combine_input_rects(a, b, request), FloatRect::new(5.0, 5.0, 5.0, 5.0));
        let atop = Composite::new(CompositeMode::Atop);
        assert_eq!(atop.combine_input_rects(a, b, request), b);

        assert_eq!(Composite::arithmetic(0.0, 0.0, 0.0, 0.1).combine_input_rects(a, b, request), request);
        assert_eq!(Composite::arithmetic(1.0, 0.0, 1.0, 0.0).combine_input_rects(a, b, request), b);
        assert_eq!(
            Composite::arithmetic(1.0, 0.0, 0.0, 0.0).combine_input_rects(a, b, request),
            FloatRect::new(5.0, 5.0, 5.0, 5.0)
        );
        assert_eq!(
            Composite::arithmetic(0.0, 1.0, 0.0, 0.0).combine_input_rects(a, b, request),
            FloatRect::new(0.0, 0.0, 15.0, 15.0)
        );
    }

    #[test]
    fn test_affects_transparent_pixels() {
        assert!(Composite::arithmetic(0.0, 0.0, 0.0, 0.2).affects_transparent_pixels());
        assert!(!Composite::arithmetic(0.0, 1.0, 0.0, 0.0).affects_transparent_pixels());
        assert!(!Composite::new(CompositeMode::Xor).affects_transparent_pixels());
    }

    #[test]
    fn test_setters() {
        let mut c = Composite::default();
        assert!(!c.set_operator(CompositeMode::Over));
        assert!(c.set_operator(CompositeMode::Arithmetic));
        assert!(c.set_coefficients(0.0, 1.0, 0.0, 0.0));
        assert!(!c.set_coefficients(0.0, 1.0, 0.0, 0.0));
    }
}
