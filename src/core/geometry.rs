//! Thin geometry and color value types.
//!
//! Rectangles follow the usual raster conventions: `x`/`y` is the top-left
//! corner, `max_x`/`max_y` are exclusive, and a rectangle with a non-positive
//! width or height is empty.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Points and Sizes
// ============================================================================

/// An integer point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntPoint {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl IntPoint {
    /// Create a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A floating point 2D point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatPoint {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl FloatPoint {
    /// Create a point.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A floating point 3D point or vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatPoint3D {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl FloatPoint3D {
    /// Create a vector.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    pub fn dot(self, other: FloatPoint3D) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Component-wise difference `self - other`.
    pub fn sub(self, other: FloatPoint3D) -> FloatPoint3D {
        FloatPoint3D::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalized(self) -> FloatPoint3D {
        let length = self.length();
        if length == 0.0 {
            return self;
        }
        FloatPoint3D::new(self.x / length, self.y / length, self.z / length)
    }
}

// ============================================================================
// Rectangles
// ============================================================================

/// An integer rectangle in absolute (device pixel) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl IntRect {
    /// Create a rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest integer rectangle covering `rect`.
    pub fn enclosing(rect: &FloatRect) -> Self {
        if rect.is_empty() {
            return Self::new(rect.x.floor() as i32, rect.y.floor() as i32, 0, 0);
        }
        let x = rect.x.floor() as i32;
        let y = rect.y.floor() as i32;
        let max_x = rect.max_x().ceil() as i32;
        let max_y = rect.max_y().ceil() as i32;
        Self::new(
            x,
            y,
            max_x.saturating_sub(x),
            max_y.saturating_sub(y),
        )
    }

    /// Exclusive right edge.
    pub fn max_x(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn max_y(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Top-left corner.
    pub fn location(&self) -> IntPoint {
        IntPoint::new(self.x, self.y)
    }

    /// True when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Pixel count, zero for empty rectangles.
    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }

    /// True when `other` lies completely inside `self`.
    pub fn contains(&self, other: &IntRect) -> bool {
        self.x <= other.x
            && self.max_x() >= other.max_x()
            && self.y <= other.y
            && self.max_y() >= other.max_y()
    }

    /// True when the pixel at `(x, y)` lies inside.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }

    /// Overlap of two rectangles, empty at the origin when they are disjoint.
    pub fn intersection(&self, other: &IntRect) -> IntRect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.max_x().min(other.max_x());
        let bottom = self.max_y().min(other.max_y());
        if left >= right || top >= bottom {
            return IntRect::default();
        }
        IntRect::new(left, top, right - left, bottom - top)
    }

    /// Bounding box of two rectangles. Empty operands are ignored.
    pub fn union(&self, other: &IntRect) -> IntRect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.max_x().max(other.max_x());
        let bottom = self.max_y().max(other.max_y());
        IntRect::new(left, top, right - left, bottom - top)
    }

    /// The same rectangle moved by `(dx, dy)`.
    pub fn translated(&self, dx: i32, dy: i32) -> IntRect {
        IntRect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }
}

impl fmt::Display for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at ({},{}) size {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// A floating point rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatRect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl FloatRect {
    /// Create a rectangle.
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// True when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Clip to `other`. Disjoint rectangles collapse to the zero rectangle.
    pub fn intersect(&mut self, other: &FloatRect) {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.max_x().min(other.max_x());
        let bottom = self.max_y().min(other.max_y());
        if left >= right || top >= bottom {
            *self = FloatRect::default();
            return;
        }
        *self = FloatRect::new(left, top, right - left, bottom - top);
    }

    /// Grow to the bounding box of `self` and `other`. Empty operands are ignored.
    pub fn unite(&mut self, other: &FloatRect) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.max_x().max(other.max_x());
        let bottom = self.max_y().max(other.max_y());
        *self = FloatRect::new(left, top, right - left, bottom - top);
    }

    /// Copy of `self` clipped to `other`.
    pub fn intersection(&self, other: &FloatRect) -> FloatRect {
        let mut rect = *self;
        rect.intersect(other);
        rect
    }

    /// Copy of `self` grown to cover `other`.
    pub fn union(&self, other: &FloatRect) -> FloatRect {
        let mut rect = *self;
        rect.unite(other);
        rect
    }

    /// Grow horizontally by `dx` on each side.
    pub fn inflate_x(&mut self, dx: f32) {
        self.x -= dx;
        self.width += dx + dx;
    }

    /// Grow vertically by `dy` on each side.
    pub fn inflate_y(&mut self, dy: f32) {
        self.y -= dy;
        self.height += dy + dy;
    }

    /// Grow by `d` on every side.
    pub fn inflate(&mut self, d: f32) {
        self.inflate_x(d);
        self.inflate_y(d);
    }

    /// Translate by `(dx, dy)`.
    pub fn move_by(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Grow the size, keeping the origin.
    pub fn expand(&mut self, dw: f32, dh: f32) {
        self.width += dw;
        self.height += dh;
    }

    /// Scale origin and size.
    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.x *= sx;
        self.y *= sy;
        self.width *= sx;
        self.height *= sy;
    }
}

impl From<IntRect> for FloatRect {
    fn from(rect: IntRect) -> Self {
        FloatRect::new(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        )
    }
}

// ============================================================================
// Color
// ============================================================================

/// An unmultiplied RGBA8 color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    /// Create a color from its channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// The same color with its alpha multiplied by `opacity` (clamped to [0,1]).
    pub fn with_alpha_multiplied_by(self, opacity: f32) -> Color {
        let opacity = opacity.clamp(0.0, 1.0);
        Color {
            a: (self.a as f32 * opacity).round() as u8,
            ..self
        }
    }

    /// Premultiplied RGBA bytes.
    pub fn premultiplied(self) -> [u8; 4] {
        let a = self.a as u16;
        let mul = |c: u8| ((c as u16 * a + 127) / 255) as u8;
        [mul(self.r), mul(self.g), mul(self.b), self.a]
    }
}
