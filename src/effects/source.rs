//! SourceGraphic and SourceAlpha: the leaves that read the bound source image.

use super::ApplyContext;
use crate::core::buffer::{AlphaRepresentation, PixelBuffer};
use crate::core::geometry::{IntPoint, IntRect};

/// The image a graph is evaluated against, placed at `origin` in absolute pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Pixels, any representation.
    pub image: PixelBuffer,
    /// Absolute position of the top-left pixel.
    pub origin: IntPoint,
}

impl SourceImage {
    /// Bind `image` with its top-left pixel at `origin`.
    pub fn new(image: PixelBuffer, origin: IntPoint) -> Self {
        Self { image, origin }
    }

    /// Absolute rectangle covered by the image.
    pub fn rect(&self) -> IntRect {
        IntRect::new(
            self.origin.x,
            self.origin.y,
            self.image.width() as i32,
            self.image.height() as i32,
        )
    }
}

pub(crate) fn apply_source_graphic(ctx: &ApplyContext<'_>) -> PixelBuffer {
    match ctx.source {
        Some(source) => source
            .image
            .as_premultiplied()
            .copy_region(source.origin, &ctx.paint_rect),
        None => ctx.transparent(AlphaRepresentation::Premultiplied),
    }
}

pub(crate) fn apply_source_alpha(ctx: &ApplyContext<'_>) -> PixelBuffer {
    let mut out = apply_source_graphic(ctx);
    for pixel in out.data_mut().chunks_exact_mut(4) {
        pixel[0] = 0;
        pixel[1] = 0;
        pixel[2] = 0;
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

    fn run(source: Option<&SourceImage>, paint_rect: IntRect, alpha: bool) -> PixelBuffer {
        let filter = FilterRegion::default();
        let parallel = ParallelSettings::serial();
        let ctx = ApplyContext {
            paint_rect,
            max_effect_rect: FloatRect::from(paint_rect),
            primitive_subregion: FloatRect::from(paint_rect),
            filter: &filter,
            operating_color_space: ColorSpace::DeviceRgb,
            is_alpha_image: alpha,
            parallel: &parallel,
            inputs: &[],
            source,
        };
        if alpha {
            apply_source_alpha(&ctx)
        } else {
            apply_source_graphic(&ctx)
        }
    }

    #[test]
    fn test_source_graphic_is_premultiplied_at_origin() {
        let mut image = PixelBuffer::new(2, 2, AlphaRepresentation::Unmultiplied);
        image.fill([200, 100, 0, 128]);
        let source = SourceImage::new(image, IntPoint::new(5, 5));

        let out = run(Some(&source), IntRect::new(4, 4, 3, 3), false);
        assert_eq!(out.representation(), AlphaRepresentation::Premultiplied);
        assert_eq!(out.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(out.pixel(1, 1), [100, 50, 0, 128]);
        assert_eq!(out.pixel(2, 2), [100, 50, 0, 128]);
    }

    #[test]
    fn test_source_alpha_drops_color() {
        let mut image = PixelBuffer::new(1, 1, AlphaRepresentation::Premultiplied);
        image.fill([10, 20, 30, 40]);
        let source = SourceImage::new(image, IntPoint::default());

        let out = run(Some(&source), IntRect::new(0, 0, 1, 1), true);
        assert_eq!(out.pixel(0, 0), [0, 0, 0, 40]);
    }

    #[test]
    fn test_missing_source_is_transparent() {
        let out = run(None, IntRect::new(0, 0, 2, 1), false);
        assert_eq!(out.width(), 2);
        assert!(out.data().iter().all(|&b| b == 0));
    }
}
