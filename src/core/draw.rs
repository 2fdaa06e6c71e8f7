//! The software draw primitive: Porter-Duff compositing of premultiplied buffers.

use crate::core::buffer::{div255, AlphaRepresentation, PixelBuffer};
use crate::core::geometry::IntRect;

/// Porter-Duff compositing rule, `source` drawn onto `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeOperator {
    /// Replace the destination.
    Copy,
    /// `S + D(1 - αS)`
    SourceOver,
    /// `S·αD`
    SourceIn,
    /// `S(1 - αD)`
    SourceOut,
    /// `S·αD + D(1 - αS)`
    SourceAtop,
    /// `S(1 - αD) + D(1 - αS)`
    Xor,
}

/// Composite one premultiplied pixel.
#[inline]
pub fn composite_pixel(src: [u8; 4], dst: [u8; 4], op: CompositeOperator) -> [u8; 4] {
    let sa = src[3] as u32;
    let da = dst[3] as u32;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let s = src[c] as u32;
        let d = dst[c] as u32;
        let value = match op {
            CompositeOperator::Copy => s,
            CompositeOperator::SourceOver => s + div255(d * (255 - sa)),
            CompositeOperator::SourceIn => div255(s * da),
            CompositeOperator::SourceOut => div255(s * (255 - da)),
            CompositeOperator::SourceAtop => div255(s * da) + div255(d * (255 - sa)),
            CompositeOperator::Xor => div255(s * (255 - da)) + div255(d * (255 - sa)),
        };
        out[c] = value.min(255) as u8;
    }
    out
}

/// Composite two equally sized buffers pixel by pixel, `source` onto `destination`.
///
/// Both buffers must be premultiplied and share one coordinate frame. The
/// result is tagged as a backend image.
pub fn composite_buffers(
    source: &PixelBuffer,
    destination: &PixelBuffer,
    op: CompositeOperator,
) -> PixelBuffer {
    let mut out = destination.clone().with_representation(AlphaRepresentation::BackendImage);
    for (dst, src) in out
        .data_mut()
        .chunks_exact_mut(4)
        .zip(source.data().chunks_exact(4))
    {
        let s = [src[0], src[1], src[2], src[3]];
        let d = [dst[0], dst[1], dst[2], dst[3]];
        dst.copy_from_slice(&composite_pixel(s, d, op));
    }
    out
}

/// Draw `source` onto `destination` with its top-left pixel at `(dx, dy)`.
///
/// Only the overlap of the two buffers is touched; destination pixels outside
/// the source footprint are left alone regardless of `op`.
pub fn draw(destination: &mut PixelBuffer, source: &PixelBuffer, dx: i32, dy: i32, op: CompositeOperator) {
    let dst_rect = IntRect::new(0, 0, destination.width() as i32, destination.height() as i32);
    let src_rect = IntRect::new(dx, dy, source.width() as i32, source.height() as i32);
    let overlap = dst_rect.intersection(&src_rect);
    if overlap.is_empty() {
        return;
    }

    let dst_width = destination.width();
    let src_width = source.width();
    let src = source.data();
    let dst = destination.data_mut();
    for y in overlap.y..overlap.max_y() {
        for x in overlap.x..overlap.max_x() {
            let so = (((y - dy) as usize) * src_width + (x - dx) as usize) * 4;
            let doff = ((y as usize) * dst_width + x as usize) * 4;
            let s = [src[so], src[so + 1], src[so + 2], src[so + 3]];
            let d = [dst[doff], dst[doff + 1], dst[doff + 2], dst[doff + 3]];
            dst[doff..doff + 4].copy_from_slice(&composite_pixel(s, d, op));
        }
    }
}

/// Draw `source` with every channel scaled by `opacity` first.
pub fn draw_with_opacity(
    destination: &mut PixelBuffer,
    source: &PixelBuffer,
    dx: i32,
    dy: i32,
    opacity: f32,
) {
    if opacity >= 1.0 {
        draw(destination, source, dx, dy, CompositeOperator::SourceOver);
        return;
    }
    let factor = (opacity.clamp(0.0, 1.0) * 255.0).round() as u32;
    let mut faded = source.clone();
    for value in faded.data_mut() {
        *value = div255(*value as u32 * factor) as u8;
    }
    draw(destination, &faded, dx, dy, CompositeOperator::SourceOver);
}
