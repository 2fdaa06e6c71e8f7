//! The filter region and the local-to-absolute scale.

use crate::core::geometry::{FloatPoint, FloatPoint3D, FloatRect};
use serde::{Deserialize, Serialize};

/// Filter region in local (user) units plus the scale to absolute pixels.
///
/// Effect parameters such as blur deviations and offsets are given in local
/// units and scaled per axis before a kernel uses them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterRegion {
    /// The filter region in local units.
    pub region: FloatRect,
    /// Horizontal local-to-absolute scale.
    #[serde(default = "unit_scale")]
    pub scale_x: f32,
    /// Vertical local-to-absolute scale.
    #[serde(default = "unit_scale")]
    pub scale_y: f32,
}

fn unit_scale() -> f32 {
    1.0
}

impl FilterRegion {
    /// A region with unit scale.
    pub fn new(region: FloatRect) -> Self {
        Self {
            region,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Set the local-to-absolute scale.
    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// The filter region in absolute pixels.
    pub fn absolute_region(&self) -> FloatRect {
        self.map_local_rect_to_absolute(&self.region)
    }

    /// Scale a horizontal length to absolute pixels.
    pub fn apply_horizontal_scale(&self, value: f32) -> f32 {
        value * self.scale_x
    }

    /// Scale a vertical length to absolute pixels.
    pub fn apply_vertical_scale(&self, value: f32) -> f32 {
        value * self.scale_y
    }

    /// Local rectangle to absolute pixels.
    pub fn map_local_rect_to_absolute(&self, rect: &FloatRect) -> FloatRect {
        let mut rect = *rect;
        rect.scale(self.scale_x, self.scale_y);
        rect
    }

    /// Absolute rectangle to local units.
    pub fn map_absolute_rect_to_local(&self, rect: &FloatRect) -> FloatRect {
        let mut rect = *rect;
        rect.scale(inverse(self.scale_x), inverse(self.scale_y));
        rect
    }

    /// Absolute point to local units.
    pub fn map_absolute_point_to_local(&self, point: FloatPoint) -> FloatPoint {
        FloatPoint::new(point.x * inverse(self.scale_x), point.y * inverse(self.scale_y))
    }

    /// Local 3D point (light positions) to absolute pixels. Z is scaled by the
    /// root-mean-square of the two axis scales.
    pub fn resolve_3d_point(&self, point: FloatPoint3D) -> FloatPoint3D {
        let z_scale = ((self.scale_x * self.scale_x + self.scale_y * self.scale_y) / 2.0).sqrt();
        FloatPoint3D::new(point.x * self.scale_x, point.y * self.scale_y, point.z * z_scale)
    }
}

impl Default for FilterRegion {
    fn default() -> Self {
        Self::new(FloatRect::default())
    }
}

fn inverse(scale: f32) -> f32 {
    if scale == 0.0 {
        0.0
    } else {
        1.0 / scale
    }
}
