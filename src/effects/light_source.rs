//! Light sources for the lighting kernels.

use crate::core::geometry::{FloatPoint3D, IntPoint};
use crate::core::region::FilterRegion;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Falloff band at the edge of a spot light's cone, in cosine units.
const ANTI_ALIAS_THRESHOLD: f32 = 0.016;

/// A light, positions in local units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LightSource {
    /// Infinitely far away in a fixed direction.
    Distant {
        /// Degrees, clockwise from the x axis in the xy plane.
        #[serde(default)]
        azimuth: f32,
        /// Degrees above the xy plane.
        #[serde(default)]
        elevation: f32,
    },
    /// Radiates in every direction from `position`.
    Point {
        /// Light position.
        position: FloatPoint3D,
    },
    /// A cone from `position` towards `points_at`.
    Spot {
        /// Light position.
        position: FloatPoint3D,
        /// Target the cone is centered on.
        points_at: FloatPoint3D,
        /// Focus of the cone.
        #[serde(default = "unit_exponent")]
        specular_exponent: f32,
        /// Half angle of the cone in degrees; unlimited when absent.
        #[serde(default)]
        limiting_cone_angle: Option<f32>,
    },
}

fn unit_exponent() -> f32 {
    1.0
}

impl Default for LightSource {
    fn default() -> Self {
        LightSource::Distant {
            azimuth: 0.0,
            elevation: 0.0,
        }
    }
}

/// Light vector and color for one surface point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// From the surface point towards the light.
    pub vector: FloatPoint3D,
    /// Length of `vector`.
    pub length: f32,
    /// Light color reaching the point, per channel in [0, 255].
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Copy)]
enum Prepared {
    Distant {
        vector: FloatPoint3D,
    },
    Point {
        position: FloatPoint3D,
    },
    Spot {
        position: FloatPoint3D,
        direction: FloatPoint3D,
        cone_cut_off: f32,
        cone_full_light: f32,
        exponent: f32,
    },
}

/// A light resolved into the pixel frame of one paint rect.
#[derive(Debug, Clone, Copy)]
pub struct PreparedLight {
    prepared: Prepared,
    color: [f32; 3],
}

impl LightSource {
    /// Resolve to absolute pixels relative to `origin`, emitting `color`.
    pub fn prepare(&self, filter: &FilterRegion, origin: IntPoint, color: [f32; 3]) -> PreparedLight {
        let to_pixels = |point: FloatPoint3D| {
            let absolute = filter.resolve_3d_point(point);
            FloatPoint3D::new(
                absolute.x - origin.x as f32,
                absolute.y - origin.y as f32,
                absolute.z,
            )
        };
        let prepared = match *self {
            LightSource::Distant { azimuth, elevation } => {
                let (sin_az, cos_az) = azimuth.to_radians().sin_cos();
                let (sin_el, cos_el) = elevation.to_radians().sin_cos();
                Prepared::Distant {
                    vector: FloatPoint3D::new(cos_az * cos_el, sin_az * cos_el, sin_el),
                }
            }
            LightSource::Point { position } => Prepared::Point {
                position: to_pixels(position),
            },
            LightSource::Spot {
                position,
                points_at,
                specular_exponent,
                limiting_cone_angle,
            } => {
                let position = to_pixels(position);
                let direction = to_pixels(points_at).sub(position).normalized();
                let (cone_cut_off, cone_full_light) = match limiting_cone_angle {
                    Some(angle) if angle != 0.0 => {
                        let angle = angle.abs().min(90.0);
                        let cut_off = (180.0 - angle).to_radians().cos();
                        (cut_off, cut_off - ANTI_ALIAS_THRESHOLD)
                    }
                    _ => (0.0, -ANTI_ALIAS_THRESHOLD),
                };
                Prepared::Spot {
                    position,
                    direction,
                    cone_cut_off,
                    cone_full_light,
                    exponent: specular_exponent,
                }
            }
        };
        PreparedLight { prepared, color }
    }

    /// Append ` key="value"` pairs.
    pub fn write_parameters(&self, out: &mut String) -> fmt::Result {
        match self {
            LightSource::Distant { azimuth, elevation } => write!(
                out,
                " light=\"distant azimuth={azimuth} elevation={elevation}\""
            ),
            LightSource::Point { position } => write!(
                out,
                " light=\"point {}, {}, {}\"",
                position.x, position.y, position.z
            ),
            LightSource::Spot {
                position,
                points_at,
                specular_exponent,
                limiting_cone_angle,
            } => {
                write!(
                    out,
                    " light=\"spot {}, {}, {} pointsAt={}, {}, {} specularExponent={}",
                    position.x,
                    position.y,
                    position.z,
                    points_at.x,
                    points_at.y,
                    points_at.z,
                    specular_exponent
                )?;
                if let Some(angle) = limiting_cone_angle {
                    write!(out, " limitingConeAngle={angle}")?;
                }
                out.push('"');
                Ok(())
            }
        }
    }
}

impl PreparedLight {
    /// Light reaching the surface point `(x, y, z)`.
    #[inline]
    pub fn sample(&self, x: f32, y: f32, z: f32) -> LightSample {
        match self.prepared {
            Prepared::Distant { vector } => LightSample {
                vector,
                length: 1.0,
                color: self.color,
            },
            Prepared::Point { position } => {
                let vector = FloatPoint3D::new(position.x - x, position.y - y, position.z - z);
                LightSample {
                    vector,
                    length: vector.length(),
                    color: self.color,
                }
            }
            Prepared::Spot {
                position,
                direction,
                cone_cut_off,
                cone_full_light,
                exponent,
            } => {
                let vector = FloatPoint3D::new(position.x - x, position.y - y, position.z - z);
                let length = vector.length();
                let cosine = if length == 0.0 {
                    -1.0
                } else {
                    vector.dot(direction) / length
                };
                if cosine > cone_cut_off {
                    return LightSample {
                        vector,
                        length,
                        color: [0.0; 3],
                    };
                }
                let mut strength = if exponent == 0.0 {
                    1.0
                } else if exponent == 1.0 {
                    -cosine
                } else {
                    (-cosine).powf(exponent)
                };
                if cosine > cone_full_light {
                    strength *= (cone_cut_off - cosine) / (cone_cut_off - cone_full_light);
                }
                let strength = strength.min(1.0);
                LightSample {
                    vector,
                    length,
                    color: self.color.map(|c| c * strength),
                }
            }
        }
    }
}
