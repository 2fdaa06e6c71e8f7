//! DisplacementMap: move the pixels of input A by amounts read from input B.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::geometry::FloatRect;
use crate::core::region::FilterRegion;
use serde::{Deserialize, Serialize};

/// Which channel of the map drives one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelSelector {
    /// Red.
    R,
    /// Green.
    G,
    /// Blue.
    B,
    /// Alpha.
    #[default]
    A,
}

impl ChannelSelector {
    /// Attribute value.
    pub fn name(self) -> &'static str {
        match self {
            ChannelSelector::R => "R",
            ChannelSelector::G => "G",
            ChannelSelector::B => "B",
            ChannelSelector::A => "A",
        }
    }

    /// Byte offset within an RGBA pixel.
    pub fn index(self) -> usize {
        match self {
            ChannelSelector::R => 0,
            ChannelSelector::G => 1,
            ChannelSelector::B => 2,
            ChannelSelector::A => 3,
        }
    }
}

/// DisplacementMap parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplacementMap {
    /// Displacement for a channel value of 255, local units.
    pub scale: f32,
    /// Channel driving horizontal displacement.
    pub x_channel: ChannelSelector,
    /// Channel driving vertical displacement.
    pub y_channel: ChannelSelector,
}

impl DisplacementMap {
    /// Displace by `scale` using the given channels.
    pub fn new(scale: f32, x_channel: ChannelSelector, y_channel: ChannelSelector) -> Self {
        Self {
            scale,
            x_channel,
            y_channel,
        }
    }

    /// Returns true when the value changed.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        if self.scale == scale {
            return false;
        }
        self.scale = scale;
        true
    }

    /// Returns true when the value changed.
    pub fn set_x_channel_selector(&mut self, channel: ChannelSelector) -> bool {
        if self.x_channel == channel {
            return false;
        }
        self.x_channel = channel;
        true
    }

    /// Returns true when the value changed.
    pub fn set_y_channel_selector(&mut self, channel: ChannelSelector) -> bool {
        if self.y_channel == channel {
            return false;
        }
        self.y_channel = channel;
        true
    }

    pub(crate) fn map_paint_rect(&self, mut rect: FloatRect, filter: &FilterRegion) -> FloatRect {
        rect.inflate_x(filter.apply_horizontal_scale(self.scale.abs() / 2.0));
        rect.inflate_y(filter.apply_vertical_scale(self.scale.abs() / 2.0));
        rect
    }

    pub(crate) fn apply(&self, ctx: &ApplyContext<'_>) -> PixelBuffer {
        let source = ctx.input_premultiplied(0);
        let map = ctx.input_unmultiplied(1);
        let mut out = ctx.transparent(AlphaRepresentation::Premultiplied);
        let (width, height) = (out.width(), out.height());

        let scale_x = ctx.filter.apply_horizontal_scale(self.scale);
        let scale_y = ctx.filter.apply_vertical_scale(self.scale);
        let color_scale_x = scale_x / 255.0;
        let color_scale_y = scale_y / 255.0;
        let offset_x = 0.5 - scale_x * 0.5;
        let offset_y = 0.5 - scale_y * 0.5;
        let channel_x = self.x_channel.index();
        let channel_y = self.y_channel.index();

        let src = source.data();
        let displacement = map.data();
        let dst = out.data_mut();
        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) * 4;
                let src_x = x as i64 + (color_scale_x * displacement[index + channel_x] as f32 + offset_x) as i64;
                let src_y = y as i64 + (color_scale_y * displacement[index + channel_y] as f32 + offset_y) as i64;
                if src_x < 0 || src_x >= width as i64 || src_y < 0 || src_y >= height as i64 {
                    continue;
                }
                let from = (src_y as usize * width + src_x as usize) * 4;
                dst[index..index + 4].copy_from_slice(&src[from..from + 4]);
            }
        }
        out
    }
}
