//! Device RGB / linear RGB conversion.
//!
//! Both directions go through 256-entry byte tables. The tables are built on
//! first use and never change afterwards.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Working color space of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorSpace {
    /// Gamma-encoded sRGB, the space images arrive and leave in.
    DeviceRgb,
    /// Linear light.
    #[default]
    LinearRgb,
}

impl ColorSpace {
    /// Stable slot index (0 or 1) for tables keyed by color space.
    pub fn index(self) -> usize {
        match self {
            ColorSpace::DeviceRgb => 0,
            ColorSpace::LinearRgb => 1,
        }
    }

    /// Name used in diagnostic output.
    pub fn name(self) -> &'static str {
        match self {
            ColorSpace::DeviceRgb => "deviceRGB",
            ColorSpace::LinearRgb => "linearRGB",
        }
    }
}

static DEVICE_TO_LINEAR: OnceLock<[u8; 256]> = OnceLock::new();
static LINEAR_TO_DEVICE: OnceLock<[u8; 256]> = OnceLock::new();

fn build_table<F>(f: F) -> [u8; 256]
where
    F: Fn(f32) -> f32,
{
    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let value = f(i as f32 / 255.0).clamp(0.0, 1.0);
        *slot = (value * 255.0).round() as u8;
    }
    table
}

/// Table mapping gamma-encoded bytes to linear bytes.
pub fn device_to_linear_table() -> &'static [u8; 256] {
    DEVICE_TO_LINEAR.get_or_init(|| {
        build_table(|c| {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        })
    })
}

/// Table mapping linear bytes to gamma-encoded bytes.
pub fn linear_to_device_table() -> &'static [u8; 256] {
    LINEAR_TO_DEVICE.get_or_init(|| {
        build_table(|c| {
            if c <= 0.003_130_8 {
                c * 12.92
            } else {
                1.055 * c.powf(1.0 / 2.4) - 0.055
            }
        })
    })
}

/// Table converting from `from` to `to`, or `None` when they are the same space.
pub fn conversion_table(from: ColorSpace, to: ColorSpace) -> Option<&'static [u8; 256]> {
    match (from, to) {
        (ColorSpace::DeviceRgb, ColorSpace::LinearRgb) => Some(device_to_linear_table()),
        (ColorSpace::LinearRgb, ColorSpace::DeviceRgb) => Some(linear_to_device_table()),
        _ => None,
    }
}

/// Convert the color channels of unmultiplied RGBA data in place. Alpha is untouched.
pub fn convert_unmultiplied(data: &mut [u8], from: ColorSpace, to: ColorSpace) {
    let Some(table) = conversion_table(from, to) else {
        return;
    };
    for pixel in data.chunks_exact_mut(4) {
        pixel[0] = table[pixel[0] as usize];
        pixel[1] = table[pixel[1] as usize];
        pixel[2] = table[pixel[2] as usize];
    }
}
