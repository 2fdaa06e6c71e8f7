//! Tile: repeat the input's max effect rect across the paint rect.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::geometry::IntRect;

pub(crate) fn apply(ctx: &ApplyContext<'_>) -> PixelBuffer {
    let mut out = ctx.transparent(AlphaRepresentation::Premultiplied);
    let Some(input) = ctx.inputs.first() else {
        return out;
    };
    let tile_rect = IntRect::enclosing(&input.max_effect_rect);
    if tile_rect.is_empty() || out.is_empty() {
        return out;
    }
    let tile = input.premultiplied_in(&tile_rect);

    let tw = tile_rect.width;
    let th = tile_rect.height;
    let width = out.width();
    let tile_width = tile.width();
    let src = tile.data();
    let dst = out.data_mut();
    for (row, line) in dst.chunks_exact_mut(width * 4).enumerate() {
        let abs_y = ctx.paint_rect.y + row as i32;
        let ty = (abs_y - tile_rect.y).rem_euclid(th) as usize;
        for (col, pixel) in line.chunks_exact_mut(4).enumerate() {
            let abs_x = ctx.paint_rect.x + col as i32;
            let tx = (abs_x - tile_rect.x).rem_euclid(tw) as usize;
            let offset = (ty * tile_width + tx) * 4;
            pixel.copy_from_slice(&src[offset..offset + 4]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color_space::ColorSpace;
    use crate::core::geometry::FloatRect;
    use crate::core::parallel::ParallelSettings;
    use crate::core::region::FilterRegion;
    use crate::effects::EffectInput;

    #[test]
    fn test_tile_repeats_from_tile_origin() {
        // 2x1 tile at (10, 0): red then blue.
        let tile_rect = IntRect::new(10, 0, 2, 1);
        let mut image = PixelBuffer::for_rect(&tile_rect, AlphaRepresentation::Premultiplied);
        image.set_pixel(0, 0, [255, 0, 0, 255]);
        image.set_pixel(1, 0, [0, 0, 255, 255]);
        let inputs = [EffectInput {
            image,
            paint_rect: tile_rect,
            max_effect_rect: FloatRect::from(tile_rect),
            is_source: false,
        }];

        let paint_rect = IntRect::new(7, 0, 4, 1);
        let filter = FilterRegion::default();
        let parallel = ParallelSettings::serial();
        let ctx = ApplyContext {
            paint_rect,
            max_effect_rect: FloatRect::from(paint_rect),
            primitive_subregion: FloatRect::from(paint_rect),
            filter: &filter,
            operating_color_space: ColorSpace::LinearRgb,
            is_alpha_image: false,
            parallel: &parallel,
            inputs: &inputs,
            source: None,
        };
        let out = apply(&ctx);
        // x = 7, 8, 9, 10 -> tile columns 1, 0, 1, 0
        assert_eq!(out.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(out.pixel(1, 0), [255, 0, 0, 255]);
        assert_eq!(out.pixel(2, 0), [0, 0, 255, 255]);
        assert_eq!(out.pixel(3, 0), [255, 0, 0, 255]);
    }
}
