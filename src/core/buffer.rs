//! RGBA8 pixel buffers and alpha representation conversion.

use crate::core::geometry::{IntPoint, IntRect};
use image::RgbaImage;
use std::borrow::Cow;

/// How the color channels of a [`PixelBuffer`] relate to its alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaRepresentation {
    /// Color channels are pre-scaled by `alpha / 255`.
    Premultiplied,
    /// Color channels are independent of alpha.
    Unmultiplied,
    /// Output of the draw primitive. Stored premultiplied.
    BackendImage,
}

impl AlphaRepresentation {
    /// True when the stored bytes are premultiplied.
    pub fn is_premultiplied(self) -> bool {
        !matches!(self, AlphaRepresentation::Unmultiplied)
    }
}

/// `round(x / 255)`, exact for every `x` up to `u16::MAX`.
#[inline]
pub fn div255(x: u32) -> u32 {
    let x = x + 128;
    (x + (x >> 8)) >> 8
}

/// Premultiply RGBA bytes in place.
pub fn premultiply_in_place(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(4) {
        let a = pixel[3] as u32;
        if a == 255 {
            continue;
        }
        pixel[0] = div255(pixel[0] as u32 * a) as u8;
        pixel[1] = div255(pixel[1] as u32 * a) as u8;
        pixel[2] = div255(pixel[2] as u32 * a) as u8;
    }
}

/// Unpremultiply RGBA bytes in place. Fully transparent pixels become zero.
pub fn unpremultiply_in_place(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(4) {
        let a = pixel[3] as u32;
        match a {
            255 => {}
            0 => {
                pixel[0] = 0;
                pixel[1] = 0;
                pixel[2] = 0;
            }
            _ => {
                let half = a / 2;
                pixel[0] = ((pixel[0] as u32 * 255 + half) / a).min(255) as u8;
                pixel[1] = ((pixel[1] as u32 * 255 + half) / a).min(255) as u8;
                pixel[2] = ((pixel[2] as u32 * 255 + half) / a).min(255) as u8;
            }
        }
    }
}

/// An RGBA8 raster tagged with its alpha representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
    representation: AlphaRepresentation,
}

impl PixelBuffer {
    /// A transparent buffer.
    pub fn new(width: usize, height: usize, representation: AlphaRepresentation) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 4],
            representation,
        }
    }

    /// A transparent buffer covering `rect`. Empty rectangles give an empty buffer.
    pub fn for_rect(rect: &IntRect, representation: AlphaRepresentation) -> Self {
        if rect.is_empty() {
            return Self::new(0, 0, representation);
        }
        Self::new(rect.width as usize, rect.height as usize, representation)
    }

    /// Wrap existing bytes. Returns `None` if the length does not match.
    pub fn from_raw(
        width: usize,
        height: usize,
        data: Vec<u8>,
        representation: AlphaRepresentation,
    ) -> Option<Self> {
        if data.len() != width * height * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
            representation,
        })
    }

    /// Wrap a decoded image (unmultiplied).
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        Self {
            width,
            height,
            data: image.into_raw(),
            representation: AlphaRepresentation::Unmultiplied,
        }
    }

    /// Unpremultiply into an image ready for encoding.
    pub fn into_rgba_image(self) -> Option<RgbaImage> {
        let buffer = self.into_unmultiplied();
        RgbaImage::from_raw(buffer.width as u32, buffer.height as u32, buffer.data)
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the buffer has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width * 4
    }

    /// Current alpha representation.
    pub fn representation(&self) -> AlphaRepresentation {
        self.representation
    }

    /// Raw RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw RGBA bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume into raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Relabel the bytes without touching them.
    pub fn with_representation(mut self, representation: AlphaRepresentation) -> Self {
        self.representation = representation;
        self
    }

    /// The pixel at `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let offset = (y * self.width + x) * 4;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    /// Overwrite the pixel at `(x, y)`.
    pub fn set_pixel(&mut self, x: usize, y: usize, value: [u8; 4]) {
        let offset = (y * self.width + x) * 4;
        self.data[offset..offset + 4].copy_from_slice(&value);
    }

    /// Fill every pixel with `value`.
    pub fn fill(&mut self, value: [u8; 4]) {
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&value);
        }
    }

    /// Convert to premultiplied form.
    pub fn into_premultiplied(mut self) -> Self {
        match self.representation {
            AlphaRepresentation::Premultiplied => self,
            AlphaRepresentation::BackendImage => {
                self.representation = AlphaRepresentation::Premultiplied;
                self
            }
            AlphaRepresentation::Unmultiplied => {
                premultiply_in_place(&mut self.data);
                self.representation = AlphaRepresentation::Premultiplied;
                self
            }
        }
    }

    /// Convert to unmultiplied form.
    pub fn into_unmultiplied(mut self) -> Self {
        if self.representation.is_premultiplied() {
            unpremultiply_in_place(&mut self.data);
            self.representation = AlphaRepresentation::Unmultiplied;
        }
        self
    }

    /// Borrow as premultiplied, converting a copy only when needed.
    pub fn as_premultiplied(&self) -> Cow<'_, PixelBuffer> {
        match self.representation {
            AlphaRepresentation::Premultiplied => Cow::Borrowed(self),
            _ => Cow::Owned(self.clone().into_premultiplied()),
        }
    }

    /// Borrow as unmultiplied, converting a copy only when needed.
    pub fn as_unmultiplied(&self) -> Cow<'_, PixelBuffer> {
        match self.representation {
            AlphaRepresentation::Unmultiplied => Cow::Borrowed(self),
            _ => Cow::Owned(self.clone().into_unmultiplied()),
        }
    }

    /// Clamp every premultiplied color channel to its alpha.
    ///
    /// Arithmetic compositing can leave `color > alpha` behind. Nothing happens
    /// for unmultiplied buffers.
    pub fn force_valid_premultiplied(&mut self) {
        if !self.representation.is_premultiplied() {
            return;
        }
        for pixel in self.data.chunks_exact_mut(4) {
            let a = pixel[3];
            pixel[0] = pixel[0].min(a);
            pixel[1] = pixel[1].min(a);
            pixel[2] = pixel[2].min(a);
        }
    }

    /// Copy `region` (absolute coordinates) out of a buffer whose top-left pixel
    /// sits at `origin`. Pixels outside this buffer come back transparent.
    pub fn copy_region(&self, origin: IntPoint, region: &IntRect) -> PixelBuffer {
        let mut out = PixelBuffer::for_rect(region, self.representation);
        if out.is_empty() || self.is_empty() {
            return out;
        }
        let own = IntRect::new(origin.x, origin.y, self.width as i32, self.height as i32);
        let overlap = own.intersection(region);
        if overlap.is_empty() {
            return out;
        }

        let row_bytes = overlap.width as usize * 4;
        let src_x = (overlap.x - origin.x) as usize;
        let dst_x = (overlap.x - region.x) as usize;
        for row in 0..overlap.height {
            let src_y = (overlap.y - origin.y + row) as usize;
            let dst_y = (overlap.y - region.y + row) as usize;
            let src_offset = (src_y * self.width + src_x) * 4;
            let dst_offset = (dst_y * out.width + dst_x) * 4;
            out.data[dst_offset..dst_offset + row_bytes]
                .copy_from_slice(&self.data[src_offset..src_offset + row_bytes]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_div255_matches_rounding() {
        for x in 0..=u16::MAX as u32 {
            let expected = (x as f64 / 255.0).round() as u32;
            assert_eq!(div255(x), expected, "x = {x}");
        }
    }

    #[test]
    fn test_unpremultiply_zero_alpha() {
        let mut data = vec![40, 50, 60, 0];
        unpremultiply_in_place(&mut data);
        assert_eq!(data, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_copy_region_pads_with_transparent() {
        let mut buffer = PixelBuffer::new(2, 2, AlphaRepresentation::Premultiplied);
        buffer.fill([10, 20, 30, 255]);

        let region = IntRect::new(9, 9, 3, 3);
        let copy = buffer.copy_region(IntPoint::new(10, 10), &region);
        assert_eq!(copy.width(), 3);
        assert_eq!(copy.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(copy.pixel(1, 1), [10, 20, 30, 255]);
        assert_eq!(copy.pixel(2, 2), [10, 20, 30, 255]);
        assert_eq!(copy.pixel(2, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_force_valid_premultiplied() {
        let mut buffer =
            PixelBuffer::from_raw(1, 1, vec![200, 10, 90, 100], AlphaRepresentation::Premultiplied)
                .unwrap();
        buffer.force_valid_premultiplied();
        assert_eq!(buffer.pixel(0, 0), [100, 10, 90, 100]);
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 15], AlphaRepresentation::Unmultiplied).is_none());
    }

    proptest! {
        #[test]
        fn opaque_round_trip_is_lossless(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
            let buffer = PixelBuffer::from_raw(1, 1, vec![r, g, b, 255], AlphaRepresentation::Unmultiplied).unwrap();
            let back = buffer.clone().into_premultiplied().into_unmultiplied();
            prop_assert_eq!(back, buffer);
        }

        #[test]
        fn premultiplied_channels_never_exceed_alpha(c in 0u8..=255, a in 0u8..=255) {
            let mut data = vec![c, c, c, a];
            premultiply_in_place(&mut data);
            prop_assert!(data[0] <= a);
        }
    }
}
